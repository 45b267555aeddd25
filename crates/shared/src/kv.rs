//! Redis 键值存储模块
//!
//! 封装 Redis 连接管理、整数读取与服务端脚本执行。多个命令需要原子完成时
//! 一律写成 Lua 脚本交给 `invoke_script`。

use crate::config::RedisConfig;
use crate::error::{InfraError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, FromRedisValue, Script};
use tracing::{info, instrument};

/// Redis 键值存储客户端
#[derive(Clone)]
pub struct KvStore {
    client: Client,
}

impl KvStore {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(InfraError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(InfraError::from)
    }

    /// 读取整数值，不存在时返回 None
    #[instrument(skip(self))]
    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.get_conn().await?;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    /// 执行 Lua 脚本
    ///
    /// 脚本在 Redis 服务端单线程执行，整个脚本对其他客户端是原子的。
    /// 首次调用会自动 SCRIPT LOAD，之后走 EVALSHA。
    pub async fn invoke_script<T: FromRedisValue>(
        &self,
        script: &Script,
        keys: &[String],
        args: &[String],
    ) -> Result<T> {
        let mut conn = self.get_conn().await?;
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(key.as_str());
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }
        let value: T = invocation.invoke_async(&mut conn).await?;
        Ok(value)
    }
}

/// 事件类型的键前缀
///
/// claim 与 view 使用独立的命名空间，互不干扰
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventNamespace {
    Claim,
    View,
}

impl EventNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::View => "view",
        }
    }
}

/// 键生成器
///
/// 所有键都由 (player_id, offer_id, 事件类型) 确定性派生。offer_id 为 UUID，
/// 不含分隔符，因此不同玩家、不同优惠之间不会产生键冲突。
pub struct KvKey;

impl KvKey {
    pub fn counter(ns: EventNamespace, player_id: &str, offer_id: &str) -> String {
        format!("offers:{}:{}:{}:counter", ns.as_str(), player_id, offer_id)
    }

    pub fn timestamp(ns: EventNamespace, player_id: &str, offer_id: &str) -> String {
        format!("offers:{}:{}:{}:timestamp", ns.as_str(), player_id, offer_id)
    }

    /// 重放去重集合（claim 存交易号，view 存曝光号）
    pub fn replay_set(ns: EventNamespace, player_id: &str, offer_id: &str) -> String {
        format!("offers:{}:{}:{}:tokens", ns.as_str(), player_id, offer_id)
    }
}
