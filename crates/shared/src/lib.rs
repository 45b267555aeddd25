//! 共享库
//!
//! 包含 offers 各组件共用的配置、错误处理、数据库连接、Redis 键值存储与可观测性等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod kv;
pub mod observability;
pub mod test_utils;
