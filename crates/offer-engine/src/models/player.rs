//! 玩家计数聚合
//!
//! 按 (game_id, player_id, offer_id) 跟踪模板维度的展示与领取次数。
//! 计数跟随模板而非版本，模板发布新版本后累计次数保持不变。
//! 重放去重集合保存在键值存储中（见 `idempotency` 模块）。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use offers_shared::kv::EventNamespace;

/// 计数事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// 领取（购买），去重令牌为交易号
    Claim,
    /// 曝光，去重令牌为曝光号
    View,
}

impl EventKind {
    pub fn namespace(&self) -> EventNamespace {
        match self {
            Self::Claim => EventNamespace::Claim,
            Self::View => EventNamespace::View,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.namespace().as_str()
    }
}

/// 策略评估所需的玩家计数
///
/// 时间戳为 unix 秒，0 表示从未发生
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerCounters {
    pub view_counter: i64,
    pub view_timestamp: i64,
    pub claim_counter: i64,
    pub claim_timestamp: i64,
}

/// 玩家计数行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OfferPlayer {
    pub game_id: String,
    pub player_id: String,
    pub offer_id: Uuid,
    pub claim_counter: i64,
    pub claim_timestamp: i64,
    pub view_counter: i64,
    pub view_timestamp: i64,
}

impl OfferPlayer {
    pub fn counters(&self) -> PlayerCounters {
        PlayerCounters {
            view_counter: self.view_counter,
            view_timestamp: self.view_timestamp,
            claim_counter: self.claim_counter,
            claim_timestamp: self.claim_timestamp,
        }
    }
}
