//! 优惠模板仓储
//!
//! 模板由管理端维护，核心只做读取

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::traits::OfferTemplateRepositoryTrait;
use crate::error::Result;
use crate::models::OfferTemplate;

const TEMPLATE_COLUMNS: &str = r#"
    id, game_id, "key", name, product_id, contents, cost, metadata,
    period, frequency, "trigger", placement, filters, enabled, version, created_at
"#;

/// 优惠模板仓储
pub struct OfferTemplateRepository {
    pool: PgPool,
}

impl OfferTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 列出游戏下启用的模板
    ///
    /// 名称升序决定同一展示位内的优先级，name 相同时按 id 保证稳定顺序
    #[instrument(skip(self))]
    pub async fn list_enabled_by_game(&self, game_id: &str) -> Result<Vec<OfferTemplate>> {
        let sql = format!(
            "SELECT {} FROM offers WHERE game_id = $1 AND enabled = TRUE ORDER BY name ASC, id ASC",
            TEMPLATE_COLUMNS
        );
        let templates = sqlx::query_as::<_, OfferTemplate>(&sql)
            .bind(game_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(templates)
    }

    /// 按 ID 获取模板
    #[instrument(skip(self))]
    pub async fn get_template(&self, game_id: &str, id: Uuid) -> Result<Option<OfferTemplate>> {
        let sql = format!(
            "SELECT {} FROM offers WHERE game_id = $1 AND id = $2",
            TEMPLATE_COLUMNS
        );
        let template = sqlx::query_as::<_, OfferTemplate>(&sql)
            .bind(game_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(template)
    }
}

#[async_trait]
impl OfferTemplateRepositoryTrait for OfferTemplateRepository {
    async fn list_enabled_by_game(&self, game_id: &str) -> Result<Vec<OfferTemplate>> {
        self.list_enabled_by_game(game_id).await
    }

    async fn get_template(&self, game_id: &str, id: Uuid) -> Result<Option<OfferTemplate>> {
        self.get_template(game_id, id).await
    }
}
