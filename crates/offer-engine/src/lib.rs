//! 优惠资格与幂等领取引擎
//!
//! 判断玩家当前可以看到哪些优惠，为每个满足条件的优惠物化稳定的玩家级实例，
//! 并在客户端重试与并发请求下安全地记录领取与曝光事件。
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `trigger`: 生效窗口评估
//! - `duration`: 时长字符串解析
//! - `policy`: 频率 / 周期策略评估
//! - `filter`: 过滤属性匹配
//! - `repository`: 数据库仓储层
//! - `idempotency`: 幂等事件记录
//! - `template_cache`: 模板读穿缓存
//! - `eligibility`: 可用优惠计算
//! - `service`: 对请求层暴露的服务入口
//! - `memory`: 内存存储实现

pub mod duration;
pub mod eligibility;
pub mod error;
pub mod filter;
pub mod idempotency;
pub mod memory;
pub mod models;
pub mod policy;
pub mod repository;
pub mod service;
pub mod template_cache;
pub mod timeout;
pub mod trigger;

pub use eligibility::{AvailableOffers, AvailableOffersQuery, EligibilityEngine};
pub use error::{OfferError, Result};
pub use filter::{FilterAttributes, TemplateFilters};
pub use idempotency::{EventRecord, EventStore, IdempotencyGuard, RedisEventStore};
pub use memory::{
    MemoryEventStore, MemoryInstanceRepository, MemoryPlayerRepository, MemoryTemplateRepository,
};
pub use models::*;
pub use policy::Eligibility;
pub use repository::{OfferInstanceRepository, OfferPlayerRepository, OfferTemplateRepository};
pub use service::{OfferService, dto};
pub use template_cache::TemplateCache;
pub use trigger::Trigger;
