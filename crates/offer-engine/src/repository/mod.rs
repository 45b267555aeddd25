//! 数据库仓储层
//!
//! 提供模板、实例与玩家计数的数据访问接口，封装 SQL 操作细节。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含资格判断逻辑
//! - 使用 SQLx 进行数据库操作
//! - 实例创建依赖自然键上的冲突安全插入，而非应用层锁
//! - 定义 trait 接口以支持 mock 测试与内存实现

mod instance_repo;
mod player_repo;
mod template_repo;
mod traits;

pub use instance_repo::OfferInstanceRepository;
pub use player_repo::OfferPlayerRepository;
pub use template_repo::OfferTemplateRepository;
pub use traits::*;
