//! 服务层
//!
//! 请求层调用的唯一入口，协调资格评估、幂等守卫与仓储。
//!
//! ## 模块结构
//!
//! - `dto`: 请求与响应对象
//! - `offer_service`: 可用优惠、领取、曝光与优惠详情

pub mod dto;
pub mod offer_service;

pub use dto::*;
pub use offer_service::OfferService;
