//! 玩家计数仓储
//!
//! 计数行是键值存储中权威计数的关系型投影，供资格评估批量读取。
//! 写入使用 `GREATEST` 保证计数单调不减。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::traits::OfferPlayerRepositoryTrait;
use crate::error::Result;
use crate::models::{EventKind, OfferPlayer};

/// 玩家计数仓储
pub struct OfferPlayerRepository {
    pool: PgPool,
}

impl OfferPlayerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取单个计数行（运维排查用）
    #[instrument(skip(self))]
    pub async fn get_player(
        &self,
        game_id: &str,
        player_id: &str,
        offer_id: Uuid,
    ) -> Result<Option<OfferPlayer>> {
        let row = sqlx::query_as::<_, OfferPlayer>(
            r#"
            SELECT game_id, player_id, offer_id, claim_counter, claim_timestamp,
                   view_counter, view_timestamp
            FROM offer_players
            WHERE game_id = $1 AND player_id = $2 AND offer_id = $3
            "#,
        )
        .bind(game_id)
        .bind(player_id)
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// 列出玩家的全部计数行
    #[instrument(skip(self))]
    pub async fn list_by_player(&self, game_id: &str, player_id: &str) -> Result<Vec<OfferPlayer>> {
        let rows = sqlx::query_as::<_, OfferPlayer>(
            r#"
            SELECT game_id, player_id, offer_id, claim_counter, claim_timestamp,
                   view_counter, view_timestamp
            FROM offer_players
            WHERE game_id = $1 AND player_id = $2
            "#,
        )
        .bind(game_id)
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// 写入计数与时间戳
    ///
    /// 只有当新计数不小于已存储计数时才覆盖时间戳，
    /// 避免乱序到达的较早事件回退状态
    #[instrument(skip(self))]
    pub async fn record_counter(
        &self,
        game_id: &str,
        player_id: &str,
        offer_id: Uuid,
        kind: EventKind,
        counter: i64,
        timestamp: i64,
    ) -> Result<()> {
        let sql = match kind {
            EventKind::Claim => {
                r#"
                INSERT INTO offer_players
                    (game_id, player_id, offer_id, claim_counter, claim_timestamp, view_counter, view_timestamp)
                VALUES ($1, $2, $3, $4, $5, 0, 0)
                ON CONFLICT (game_id, player_id, offer_id) DO UPDATE SET
                    claim_timestamp = CASE
                        WHEN EXCLUDED.claim_counter >= offer_players.claim_counter
                        THEN EXCLUDED.claim_timestamp
                        ELSE offer_players.claim_timestamp
                    END,
                    claim_counter = GREATEST(offer_players.claim_counter, EXCLUDED.claim_counter),
                    updated_at = NOW()
                "#
            }
            EventKind::View => {
                r#"
                INSERT INTO offer_players
                    (game_id, player_id, offer_id, claim_counter, claim_timestamp, view_counter, view_timestamp)
                VALUES ($1, $2, $3, 0, 0, $4, $5)
                ON CONFLICT (game_id, player_id, offer_id) DO UPDATE SET
                    view_timestamp = CASE
                        WHEN EXCLUDED.view_counter >= offer_players.view_counter
                        THEN EXCLUDED.view_timestamp
                        ELSE offer_players.view_timestamp
                    END,
                    view_counter = GREATEST(offer_players.view_counter, EXCLUDED.view_counter),
                    updated_at = NOW()
                "#
            }
        };

        sqlx::query(sql)
            .bind(game_id)
            .bind(player_id)
            .bind(offer_id)
            .bind(counter)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl OfferPlayerRepositoryTrait for OfferPlayerRepository {
    async fn list_by_player(&self, game_id: &str, player_id: &str) -> Result<Vec<OfferPlayer>> {
        self.list_by_player(game_id, player_id).await
    }

    async fn record_counter(
        &self,
        game_id: &str,
        player_id: &str,
        offer_id: Uuid,
        kind: EventKind,
        counter: i64,
        timestamp: i64,
    ) -> Result<()> {
        self.record_counter(game_id, player_id, offer_id, kind, counter, timestamp)
            .await
    }
}
