//! 优惠模板实体定义
//!
//! 模板由管理端创建和修改，对核心只读。策略字段以原始 JSON 存储，
//! 在使用时解码，解码失败属于数据完整性问题。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{OfferError, Result};
use crate::filter::TemplateFilters;
use crate::trigger::Trigger;

/// 频率 / 周期配置
///
/// `every` 为 Go 风格时长字符串（如 "1h30m"），空字符串表示未配置；
/// `max` 为总次数上限，0 表示不限
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyOrPeriod {
    #[serde(default, alias = "Every")]
    pub every: String,
    #[serde(default, alias = "Max")]
    pub max: i64,
}

impl FrequencyOrPeriod {
    pub fn new(every: impl Into<String>, max: i64) -> Self {
        Self {
            every: every.into(),
            max,
        }
    }

    /// 是否配置了冷却间隔
    pub fn has_every(&self) -> bool {
        !self.every.is_empty()
    }

    /// 是否配置了总次数上限
    pub fn has_max(&self) -> bool {
        self.max > 0
    }
}

/// 优惠模板
///
/// 同一 (game_id, key) 下最多只有一个启用的模板；每次修改 version 自增
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OfferTemplate {
    pub id: Uuid,
    pub game_id: String,
    /// 模板跨版本的稳定标识
    pub key: Uuid,
    pub name: String,
    /// 商品 ID，可为空字符串
    #[sqlx(default)]
    pub product_id: String,
    /// 奖励内容
    pub contents: Value,
    #[sqlx(default)]
    pub cost: Value,
    #[sqlx(default)]
    pub metadata: Value,
    /// 领取周期：{"every": "...", "max": n}
    pub period: Value,
    /// 展示频率：{"every": "...", "max": n}
    pub frequency: Value,
    /// 生效窗口：{"from": unix, "to": unix}
    pub trigger: Value,
    /// 展示位
    pub placement: String,
    /// 声明的过滤属性：{"attr": {"eq": "..."}}
    #[sqlx(default)]
    pub filters: Value,
    pub enabled: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl OfferTemplate {
    /// 解析展示频率配置
    pub fn parse_frequency(&self) -> Result<FrequencyOrPeriod> {
        parse_policy("frequency", &self.frequency)
    }

    /// 解析领取周期配置
    pub fn parse_period(&self) -> Result<FrequencyOrPeriod> {
        parse_policy("period", &self.period)
    }

    /// 解析生效窗口
    pub fn parse_trigger(&self) -> Result<Trigger> {
        Trigger::from_json(&self.trigger)
    }

    /// 解析声明的过滤属性
    pub fn parse_filters(&self) -> Result<TemplateFilters> {
        TemplateFilters::from_json(&self.filters)
    }
}

fn parse_policy(field: &str, value: &Value) -> Result<FrequencyOrPeriod> {
    if value.is_null() {
        return Ok(FrequencyOrPeriod::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| OfferError::ValidationFailed(format!("invalid {}: {}", field, e)))
}
