//! 优惠实例实体定义
//!
//! 实例是模板某个版本对某个玩家的不可变物化结果，也是客户端领取 / 曝光时
//! 使用的稳定句柄。每个 (game_id, player_id, offer_id, offer_version) 只有一行，
//! 创建后从不更新或删除。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::template::OfferTemplate;

/// 优惠实例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OfferInstance {
    pub id: Uuid,
    pub game_id: String,
    pub player_id: String,
    /// 模板 ID
    pub offer_id: Uuid,
    pub offer_version: i32,
    /// 创建时的奖励内容快照
    pub contents: Value,
    #[sqlx(default)]
    pub product_id: String,
    #[sqlx(default)]
    pub cost: Value,
    pub created_at: DateTime<Utc>,
}

/// 待创建的优惠实例（自然键 + 快照）
#[derive(Debug, Clone, PartialEq)]
pub struct NewOfferInstance {
    pub game_id: String,
    pub player_id: String,
    pub offer_id: Uuid,
    pub offer_version: i32,
    pub contents: Value,
    pub product_id: String,
    pub cost: Value,
}

impl NewOfferInstance {
    /// 从模板当前版本构造
    pub fn from_template(template: &OfferTemplate, player_id: &str) -> Self {
        Self {
            game_id: template.game_id.clone(),
            player_id: player_id.to_string(),
            offer_id: template.id,
            offer_version: template.version,
            contents: template.contents.clone(),
            product_id: template.product_id.clone(),
            cost: template.cost.clone(),
        }
    }
}

/// 返回给客户端的优惠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferToReturn {
    /// 实例 ID
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub cost: Value,
    pub contents: Value,
    pub metadata: Value,
    /// 生效窗口结束时间（unix 秒），无窗口时为 0
    pub expire_at: i64,
}
