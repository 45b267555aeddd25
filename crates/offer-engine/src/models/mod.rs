//! 优惠引擎领域模型
//!
//! 包含优惠模板、玩家级优惠实例与玩家计数聚合

pub mod instance;
pub mod player;
pub mod template;

// 重新导出常用类型
pub use instance::{NewOfferInstance, OfferInstance, OfferToReturn};
pub use player::{EventKind, OfferPlayer, PlayerCounters};
pub use template::{FrequencyOrPeriod, OfferTemplate};
