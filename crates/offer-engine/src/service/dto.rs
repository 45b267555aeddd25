//! 服务层数据传输对象
//!
//! 领取 / 曝光的业务结果（重复领取、已下架）通过布尔字段表达，不作为错误返回

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 领取目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClaimTarget {
    /// 客户端持有的实例 ID
    Instance { id: Uuid },
    /// 按商品定位玩家在领取时间之前最近创建的实例
    Product { product_id: String },
}

/// 领取请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOfferRequest {
    pub game_id: String,
    pub player_id: String,
    pub target: ClaimTarget,
    /// 交易号，作为去重令牌
    pub transaction_id: String,
    /// 购买时间（unix 秒），作为计数时间
    pub timestamp: i64,
}

/// 领取结果
///
/// 重复领取返回与首次领取相同的 contents 与 next_at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOfferResponse {
    pub contents: Value,
    pub already_claimed: bool,
    /// 下一次可领取时间，0 表示不再可领
    pub next_at: i64,
}

/// 曝光请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOfferRequest {
    pub game_id: String,
    pub player_id: String,
    pub instance_id: Uuid,
    /// 曝光号，作为去重令牌
    pub impression_id: String,
    pub now: i64,
}

/// 曝光结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOfferResponse {
    pub already_viewed: bool,
    pub next_at: i64,
}
