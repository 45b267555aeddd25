//! 优惠引擎错误类型
//!
//! 业务结果（不满足资格、重复领取）从不作为错误返回，这里只包含
//! 数据缺失、模型约束、数据完整性与存储故障四类。

use std::collections::BTreeMap;

use offers_shared::error::InfraError;
use thiserror::Error;

/// 优惠引擎错误类型
#[derive(Debug, Error)]
pub enum OfferError {
    // === 数据缺失 ===
    #[error("{entity} 不存在: {}", format_filters(.filters))]
    NotFound {
        entity: &'static str,
        filters: BTreeMap<&'static str, String>,
    },

    // === 模型约束 ===
    #[error("{entity} 模型无效: {message}")]
    InvalidModel {
        entity: &'static str,
        message: String,
    },

    // === 数据完整性（模板中存储的策略 JSON 或时长字符串非法）===
    #[error("数据校验失败: {0}")]
    ValidationFailed(String),

    // === 存储故障 ===
    #[error("存储不可用: {0}")]
    StorageUnavailable(String),

    #[error("存储操作超时: {operation}")]
    Timeout { operation: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

fn format_filters(filters: &BTreeMap<&'static str, String>) -> String {
    filters
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 优惠引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, OfferError>;

impl OfferError {
    /// 构造 NotFound 错误
    pub fn not_found<const N: usize>(
        entity: &'static str,
        filters: [(&'static str, &str); N],
    ) -> Self {
        Self::NotFound {
            entity,
            filters: filters
                .into_iter()
                .map(|(k, v)| (k, v.to_string()))
                .collect(),
        }
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidModel { .. } => "INVALID_MODEL",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::Timeout { .. } => "STORAGE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 请求层应返回的 HTTP 状态码
    ///
    /// 模板中的非法数据属于数据完整性缺陷而非用户输入错误，按 500 处理
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidModel { .. } => 422,
            _ => 500,
        }
    }

    /// 检查是否为存储层故障
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Timeout { .. })
    }
}

impl From<sqlx::Error> for OfferError {
    fn from(err: sqlx::Error) -> Self {
        // 23503: foreign_key_violation，例如引用了不存在的游戏或模板
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some("23503") {
                return Self::InvalidModel {
                    entity: "OfferInstance",
                    message: db_err.message().to_string(),
                };
            }
        }
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<redis::RedisError> for OfferError {
    fn from(err: redis::RedisError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for OfferError {
    fn from(err: serde_json::Error) -> Self {
        Self::ValidationFailed(err.to_string())
    }
}

impl From<InfraError> for OfferError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Database(e) => e.into(),
            InfraError::Redis(e) => e.into(),
            InfraError::Serialization(e) => e.into(),
            InfraError::Timeout { operation } => Self::Timeout { operation },
            InfraError::Internal(message) => Self::Internal(message),
        }
    }
}
