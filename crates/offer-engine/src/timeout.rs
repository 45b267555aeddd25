//! 存储调用超时
//!
//! 服务层发起的每次存储调用都带超时。超时后丢弃 future 即取消进行中的调用，
//! 已生效的计数自增不回滚。

use std::future::Future;
use std::time::{Duration, Instant};

use offers_shared::observability::metrics;
use tracing::warn;

use crate::error::{OfferError, Result};

/// 在超时限制内执行存储操作，并记录耗时
pub async fn with_timeout<T, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, fut).await;
    metrics::record_store_operation(operation, start.elapsed());

    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "Store operation timed out");
            Err(OfferError::Timeout {
                operation: operation.to_string(),
            })
        }
    }
}
