//! 指标模块
//!
//! 基于 metrics facade 记录业务指标。核心不安装 exporter，
//! 未安装 recorder 时所有记录都是空操作。

use std::time::Duration;

/// 注册指标描述
pub fn describe() {
    metrics::describe_counter!("offer_claims_total", "Total number of offer claim requests");
    metrics::describe_counter!("offer_views_total", "Total number of offer view requests");
    metrics::describe_counter!(
        "available_offers_total",
        "Total number of offers returned by availability queries"
    );
    metrics::describe_counter!(
        "offer_template_cache_total",
        "Offer template cache lookups by result"
    );
    metrics::describe_histogram!(
        "store_operation_duration_seconds",
        "Duration of store operations in seconds"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 claim 请求
///
/// result 取值：counted / replayed
#[inline]
pub fn record_claim(game_id: &str, result: &'static str) {
    metrics::counter!(
        "offer_claims_total",
        "game" => game_id.to_string(),
        "result" => result
    )
    .increment(1);
}

/// 记录 view 请求
#[inline]
pub fn record_view(game_id: &str, result: &'static str) {
    metrics::counter!(
        "offer_views_total",
        "game" => game_id.to_string(),
        "result" => result
    )
    .increment(1);
}

/// 记录可用优惠查询返回的数量
#[inline]
pub fn record_available_offers(game_id: &str, count: usize) {
    metrics::counter!("available_offers_total", "game" => game_id.to_string())
        .increment(count as u64);
}

/// 记录模板缓存命中情况
#[inline]
pub fn record_template_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("offer_template_cache_total", "result" => result).increment(1);
}

/// 记录存储操作耗时
#[inline]
pub fn record_store_operation(operation: &'static str, elapsed: Duration) {
    metrics::histogram!("store_operation_duration_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());
}
