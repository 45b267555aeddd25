//! 幂等守卫
//!
//! 同一协议按事件类型实例化两次（领取、曝光）

use std::sync::Arc;

use tracing::{info, instrument};

use super::store::{EventRecord, EventStore};
use crate::error::Result;
use crate::models::EventKind;

/// 幂等守卫
///
/// 绑定事件类型，对外只暴露 `record_event`
pub struct IdempotencyGuard<S: EventStore + ?Sized> {
    kind: EventKind,
    store: Arc<S>,
}

impl<S: EventStore + ?Sized> Clone for IdempotencyGuard<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EventStore + ?Sized> IdempotencyGuard<S> {
    pub fn new(kind: EventKind, store: Arc<S>) -> Self {
        Self { kind, store }
    }

    /// 领取守卫，去重令牌为交易号
    pub fn claims(store: Arc<S>) -> Self {
        Self::new(EventKind::Claim, store)
    }

    /// 曝光守卫，去重令牌为曝光号
    pub fn views(store: Arc<S>) -> Self {
        Self::new(EventKind::View, store)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// 记录一次事件
    ///
    /// 存储错误直接返回，已生效的自增不回滚
    #[instrument(skip(self), fields(kind = self.kind.as_str()))]
    pub async fn record_event(
        &self,
        player_id: &str,
        offer_id: &str,
        token: &str,
        now: i64,
    ) -> Result<EventRecord> {
        let record = self
            .store
            .record(self.kind, player_id, offer_id, token, now)
            .await?;

        if record.already_processed {
            info!(counter = record.counter, "Replayed event ignored");
        }
        Ok(record)
    }
}
