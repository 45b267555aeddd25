//! 事件计数存储
//!
//! 键值存储中的计数是权威数据，关系库中的计数行只是投影

use async_trait::async_trait;
use redis::Script;
use std::sync::LazyLock;
use tracing::{debug, instrument};

use offers_shared::kv::{KvKey, KvStore};

use crate::error::{OfferError, Result};
use crate::models::EventKind;

/// 一次事件记录的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// 令牌此前已被处理，本次未做任何修改
    pub already_processed: bool,
    /// 记录后的计数
    pub counter: i64,
    /// 被计数事件的时间戳（重放时为原事件的时间戳）
    pub timestamp: i64,
}

/// 事件计数存储接口
///
/// 实现必须保证同一 (kind, player_id, offer_id, token) 的并发调用只计数一次
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn record(
        &self,
        kind: EventKind,
        player_id: &str,
        offer_id: &str,
        token: &str,
        now: i64,
    ) -> Result<EventRecord>;
}

/// 检查 / 自增 / 加入集合的原子脚本
///
/// KEYS: counter, timestamp, replay set
/// ARGV: token, now
/// 返回 {already_processed, counter, timestamp}
static RECORD_EVENT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('SISMEMBER', KEYS[3], ARGV[1]) == 1 then
            local counter = tonumber(redis.call('GET', KEYS[1]) or '0')
            local timestamp = tonumber(redis.call('GET', KEYS[2]) or '0')
            return {1, counter, timestamp}
        end
        local counter = redis.call('INCR', KEYS[1])
        redis.call('SET', KEYS[2], ARGV[2])
        redis.call('SADD', KEYS[3], ARGV[1])
        return {0, counter, tonumber(ARGV[2])}
        "#,
    )
});

/// 基于 Redis 的事件计数存储
#[derive(Clone)]
pub struct RedisEventStore {
    kv: KvStore,
}

impl RedisEventStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// 读取当前计数与时间戳，不存在时为 0
    pub async fn snapshot(
        &self,
        kind: EventKind,
        player_id: &str,
        offer_id: &str,
    ) -> Result<(i64, i64)> {
        let ns = kind.namespace();
        let counter = self
            .kv
            .get_i64(&KvKey::counter(ns, player_id, offer_id))
            .await?
            .unwrap_or(0);
        let timestamp = self
            .kv
            .get_i64(&KvKey::timestamp(ns, player_id, offer_id))
            .await?
            .unwrap_or(0);
        Ok((counter, timestamp))
    }
}

#[async_trait]
impl EventStore for RedisEventStore {
    #[instrument(skip(self, kind), fields(kind = kind.as_str()))]
    async fn record(
        &self,
        kind: EventKind,
        player_id: &str,
        offer_id: &str,
        token: &str,
        now: i64,
    ) -> Result<EventRecord> {
        let ns = kind.namespace();
        let keys = [
            KvKey::counter(ns, player_id, offer_id),
            KvKey::timestamp(ns, player_id, offer_id),
            KvKey::replay_set(ns, player_id, offer_id),
        ];
        let args = [token.to_string(), now.to_string()];

        let reply: Vec<i64> = self
            .kv
            .invoke_script(&RECORD_EVENT_SCRIPT, &keys, &args)
            .await?;

        let [processed, counter, timestamp] = reply[..] else {
            return Err(OfferError::Internal(format!(
                "unexpected record script reply: {:?}",
                reply
            )));
        };

        debug!(
            already_processed = processed == 1,
            counter, timestamp, "Event recorded"
        );

        Ok(EventRecord {
            already_processed: processed == 1,
            counter,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offers_shared::test_utils::{test_player_id, test_redis_config};
    use uuid::Uuid;

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_redis_record_is_idempotent() {
        let store = RedisEventStore::new(KvStore::new(&test_redis_config()).unwrap());
        let player_id = test_player_id();
        let offer_id = Uuid::new_v4().to_string();

        let first = store
            .record(EventKind::Claim, &player_id, &offer_id, "tx-1", 100)
            .await
            .unwrap();
        assert_eq!(
            first,
            EventRecord {
                already_processed: false,
                counter: 1,
                timestamp: 100
            }
        );

        let replay = store
            .record(EventKind::Claim, &player_id, &offer_id, "tx-1", 200)
            .await
            .unwrap();
        assert!(replay.already_processed);
        assert_eq!(replay.counter, 1);
        assert_eq!(replay.timestamp, 100);

        let second = store
            .record(EventKind::Claim, &player_id, &offer_id, "tx-2", 300)
            .await
            .unwrap();
        assert_eq!(second.counter, 2);

        // 不同事件类型互不影响
        let view = store
            .record(EventKind::View, &player_id, &offer_id, "tx-1", 400)
            .await
            .unwrap();
        assert!(!view.already_processed);
        assert_eq!(view.counter, 1);

        assert_eq!(
            store
                .snapshot(EventKind::Claim, &player_id, &offer_id)
                .await
                .unwrap(),
            (2, 300)
        );
    }

    #[tokio::test]
    #[ignore] // 需要 Redis 连接
    async fn test_redis_concurrent_same_token_counts_once() {
        let store = RedisEventStore::new(KvStore::new(&test_redis_config()).unwrap());
        let player_id = test_player_id();
        let offer_id = Uuid::new_v4().to_string();

        let calls = (0..16).map(|_| {
            let store = store.clone();
            let player_id = player_id.clone();
            let offer_id = offer_id.clone();
            tokio::spawn(async move {
                store
                    .record(EventKind::Claim, &player_id, &offer_id, "tx-race", 100)
                    .await
            })
        });
        let results: Vec<EventRecord> = futures::future::join_all(calls)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| !r.already_processed).count(), 1);
        assert!(results.iter().all(|r| r.counter == 1 && r.timestamp == 100));
    }
}
