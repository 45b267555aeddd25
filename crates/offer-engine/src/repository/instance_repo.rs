//! 优惠实例仓储
//!
//! 实例只插入不更新。创建走自然键 (game_id, player_id, offer_id, offer_version)
//! 上的 `ON CONFLICT DO NOTHING`，冲突时回读已存在的行，
//! 并发的首次创建者因此收敛到同一个 ID。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::traits::OfferInstanceRepositoryTrait;
use crate::error::{OfferError, Result};
use crate::models::{NewOfferInstance, OfferInstance};

/// 优惠实例仓储
pub struct OfferInstanceRepository {
    pool: PgPool,
}

impl OfferInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 查找或创建实例
    #[instrument(
        skip(self, instance),
        fields(
            game_id = %instance.game_id,
            player_id = %instance.player_id,
            offer_id = %instance.offer_id,
            offer_version = instance.offer_version
        )
    )]
    pub async fn find_or_create(&self, instance: &NewOfferInstance) -> Result<OfferInstance> {
        let inserted = sqlx::query_as::<_, OfferInstance>(
            r#"
            INSERT INTO offer_instances
                (id, game_id, player_id, offer_id, offer_version, contents, product_id, cost, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (game_id, player_id, offer_id, offer_version) DO NOTHING
            RETURNING id, game_id, player_id, offer_id, offer_version, contents,
                      product_id, cost, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&instance.game_id)
        .bind(&instance.player_id)
        .bind(instance.offer_id)
        .bind(instance.offer_version)
        .bind(&instance.contents)
        .bind(&instance.product_id)
        .bind(&instance.cost)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(created) = inserted {
            debug!(instance_id = %created.id, "Offer instance created");
            return Ok(created);
        }

        // 冲突：其他调用方已创建，回读同一自然键
        let existing = sqlx::query_as::<_, OfferInstance>(
            r#"
            SELECT id, game_id, player_id, offer_id, offer_version, contents,
                   product_id, cost, created_at
            FROM offer_instances
            WHERE game_id = $1 AND player_id = $2 AND offer_id = $3 AND offer_version = $4
            "#,
        )
        .bind(&instance.game_id)
        .bind(&instance.player_id)
        .bind(instance.offer_id)
        .bind(instance.offer_version)
        .fetch_optional(&self.pool)
        .await?;

        existing.ok_or_else(|| {
            OfferError::Internal(format!(
                "offer instance conflict without existing row: offer_id={}",
                instance.offer_id
            ))
        })
    }

    /// 根据 ID 获取实例
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, game_id: &str, id: Uuid) -> Result<Option<OfferInstance>> {
        let instance = sqlx::query_as::<_, OfferInstance>(
            r#"
            SELECT id, game_id, player_id, offer_id, offer_version, contents,
                   product_id, cost, created_at
            FROM offer_instances
            WHERE game_id = $1 AND id = $2
            "#,
        )
        .bind(game_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(instance)
    }

    /// 获取玩家某商品在指定时间之前创建的最新实例
    #[instrument(skip(self))]
    pub async fn find_latest_by_product(
        &self,
        game_id: &str,
        player_id: &str,
        product_id: &str,
        before: i64,
    ) -> Result<Option<OfferInstance>> {
        let instance = sqlx::query_as::<_, OfferInstance>(
            r#"
            SELECT id, game_id, player_id, offer_id, offer_version, contents,
                   product_id, cost, created_at
            FROM offer_instances
            WHERE game_id = $1 AND player_id = $2 AND product_id = $3
              AND created_at < to_timestamp($4)
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(game_id)
        .bind(player_id)
        .bind(product_id)
        .bind(before as f64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(instance)
    }
}

#[async_trait]
impl OfferInstanceRepositoryTrait for OfferInstanceRepository {
    async fn find_or_create(&self, instance: &NewOfferInstance) -> Result<OfferInstance> {
        self.find_or_create(instance).await
    }

    async fn get_by_id(&self, game_id: &str, id: Uuid) -> Result<Option<OfferInstance>> {
        self.get_by_id(game_id, id).await
    }

    async fn find_latest_by_product(
        &self,
        game_id: &str,
        player_id: &str,
        product_id: &str,
        before: i64,
    ) -> Result<Option<OfferInstance>> {
        self.find_latest_by_product(game_id, player_id, product_id, before)
            .await
    }
}
