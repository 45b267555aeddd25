//! 幂等事件记录
//!
//! 领取与曝光共用同一套协议，按事件类型区分命名空间与去重令牌：
//! 领取使用交易号，曝光使用曝光号。
//!
//! ## 协议
//!
//! 1. 令牌已在重放集合中：读取当前计数与时间戳，不做任何修改
//! 2. 否则：计数自增、时间戳置为本次事件时间、令牌加入重放集合
//!
//! 检查、自增与加入集合在键值存储端以单个脚本原子执行，
//! 同一令牌的并发重试只会计数一次。

mod guard;
mod store;

pub use guard::IdempotencyGuard;
pub use store::{EventRecord, EventStore, RedisEventStore};

#[cfg(test)]
pub use store::MockEventStore;
