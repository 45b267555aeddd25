//! 仓储 Trait 定义
//!
//! 服务层依赖抽象而非具体实现，PostgreSQL 与内存实现共用同一组接口

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EventKind, NewOfferInstance, OfferInstance, OfferPlayer, OfferTemplate};

/// 优惠模板仓储接口（只读）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfferTemplateRepositoryTrait: Send + Sync {
    /// 列出游戏下所有启用的模板，按名称升序
    async fn list_enabled_by_game(&self, game_id: &str) -> Result<Vec<OfferTemplate>>;

    /// 按 ID 获取模板，不区分启用状态
    async fn get_template(&self, game_id: &str, id: Uuid) -> Result<Option<OfferTemplate>>;
}

/// 优惠实例仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfferInstanceRepositoryTrait: Send + Sync {
    /// 按自然键查找实例，不存在则创建
    ///
    /// 并发调用同一自然键时必须收敛到同一行、同一 ID
    async fn find_or_create(&self, instance: &NewOfferInstance) -> Result<OfferInstance>;

    async fn get_by_id(&self, game_id: &str, id: Uuid) -> Result<Option<OfferInstance>>;

    /// 获取玩家在 `before`（unix 秒）之前创建的该商品最新实例
    async fn find_latest_by_product(
        &self,
        game_id: &str,
        player_id: &str,
        product_id: &str,
        before: i64,
    ) -> Result<Option<OfferInstance>>;
}

/// 玩家计数仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfferPlayerRepositoryTrait: Send + Sync {
    /// 列出玩家在该游戏下的全部计数行
    async fn list_by_player(&self, game_id: &str, player_id: &str) -> Result<Vec<OfferPlayer>>;

    /// 写入一次已计数事件后的计数与时间戳
    ///
    /// 计数只增不减：已存储的值更大时保留原值
    async fn record_counter(
        &self,
        game_id: &str,
        player_id: &str,
        offer_id: Uuid,
        kind: EventKind,
        counter: i64,
        timestamp: i64,
    ) -> Result<()>;
}
