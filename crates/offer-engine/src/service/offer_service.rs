//! 优惠服务
//!
//! ## 领取流程
//!
//! 1. 定位实例（实例 ID，或按商品查找领取时间之前最近的实例）
//! 2. 读取实例对应的模板并解析策略
//! 3. 幂等守卫记录事件（交易号去重，计数时间为购买时间）
//! 4. 写入关系库计数投影（重放同样写入，补上此前失败的投影写入）
//! 5. 按记录后的计数与时间戳计算 next_at
//!
//! 曝光流程相同，但模板已禁用时直接返回且不做任何修改，计数时间为 now。
//! 重放时 next_at 由已存储的计数与时间戳算出，因此与首次调用结果一致。

use std::sync::Arc;
use std::time::Duration;

use offers_shared::config::OffersConfig;
use offers_shared::observability::metrics;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::eligibility::{AvailableOffers, AvailableOffersQuery, EligibilityEngine};
use crate::error::{OfferError, Result};
use crate::filter::FilterAttributes;
use crate::idempotency::{EventStore, IdempotencyGuard};
use crate::models::{EventKind, OfferInstance, OfferTemplate, OfferToReturn};
use crate::policy;
use crate::repository::{
    OfferInstanceRepositoryTrait, OfferPlayerRepositoryTrait, OfferTemplateRepositoryTrait,
};
use crate::service::dto::{
    ClaimOfferRequest, ClaimOfferResponse, ClaimTarget, ViewOfferRequest, ViewOfferResponse,
};
use crate::template_cache::TemplateCache;
use crate::timeout::with_timeout;

/// 优惠服务
pub struct OfferService<TR, IR, PR, ES>
where
    TR: OfferTemplateRepositoryTrait,
    IR: OfferInstanceRepositoryTrait,
    PR: OfferPlayerRepositoryTrait,
    ES: EventStore + ?Sized,
{
    engine: EligibilityEngine<TR, IR, PR>,
    template_repo: Arc<TR>,
    instance_repo: Arc<IR>,
    player_repo: Arc<PR>,
    claims: IdempotencyGuard<ES>,
    views: IdempotencyGuard<ES>,
    config: OffersConfig,
}

impl<TR, IR, PR, ES> OfferService<TR, IR, PR, ES>
where
    TR: OfferTemplateRepositoryTrait,
    IR: OfferInstanceRepositoryTrait,
    PR: OfferPlayerRepositoryTrait,
    ES: EventStore + ?Sized,
{
    pub fn new(
        template_repo: Arc<TR>,
        instance_repo: Arc<IR>,
        player_repo: Arc<PR>,
        event_store: Arc<ES>,
        config: OffersConfig,
    ) -> Self {
        let engine = EligibilityEngine::new(
            Arc::clone(&template_repo),
            Arc::clone(&instance_repo),
            Arc::clone(&player_repo),
            TemplateCache::new(),
            config.store_timeout(),
        );

        Self {
            engine,
            template_repo,
            instance_repo,
            player_repo,
            claims: IdempotencyGuard::claims(Arc::clone(&event_store)),
            views: IdempotencyGuard::views(event_store),
            config,
        }
    }

    fn store_timeout(&self) -> Duration {
        self.config.store_timeout()
    }

    // ==================== 可用优惠 ====================

    /// 获取玩家当前可用的优惠
    ///
    /// 缓存有效期与通配匹配开关取自配置
    pub async fn get_available_offers(
        &self,
        game_id: &str,
        player_id: &str,
        now: i64,
        filter_attrs: FilterAttributes,
    ) -> Result<AvailableOffers> {
        let query = AvailableOffersQuery {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            now,
            cache_ttl: self.config.cache_ttl_for(game_id),
            filter_attrs,
            allow_wildcard_filter_match: self.config.allow_wildcard_filter_match,
        };
        self.engine.get_available_offers(&query).await
    }

    /// 模板变更后丢弃游戏的模板缓存
    pub fn invalidate_templates(&self, game_id: &str) {
        self.engine.cache().invalidate(game_id);
    }

    // ==================== 领取 ====================

    /// 领取优惠
    #[instrument(
        skip(self, request),
        fields(
            game_id = %request.game_id,
            player_id = %request.player_id,
            transaction_id = %request.transaction_id
        )
    )]
    pub async fn claim_offer(&self, request: &ClaimOfferRequest) -> Result<ClaimOfferResponse> {
        let game_id = request.game_id.as_str();
        let player_id = request.player_id.as_str();

        let instance = match &request.target {
            ClaimTarget::Instance { id } => self.player_instance(game_id, player_id, *id).await?,
            ClaimTarget::Product { product_id } => {
                self.latest_product_instance(game_id, player_id, product_id, request.timestamp)
                    .await?
            }
        };

        let template = self.load_template(game_id, instance.offer_id).await?;
        // 先解析策略，非法数据不产生计数
        let frequency = template.parse_frequency()?;
        let period = template.parse_period()?;

        let offer_id = instance.offer_id.to_string();
        let record = with_timeout(
            self.store_timeout(),
            "kv.record_claim",
            self.claims.record_event(
                player_id,
                &offer_id,
                &request.transaction_id,
                request.timestamp,
            ),
        )
        .await?;

        // 投影写入单调且幂等，重放时也写入
        with_timeout(
            self.store_timeout(),
            "offer_players.record_counter",
            self.player_repo.record_counter(
                game_id,
                player_id,
                instance.offer_id,
                EventKind::Claim,
                record.counter,
                record.timestamp,
            ),
        )
        .await?;

        let next_at = policy::next_claim_at(
            template.enabled,
            &frequency,
            &period,
            record.counter,
            record.timestamp,
        )?;

        metrics::record_claim(
            game_id,
            if record.already_processed {
                "replayed"
            } else {
                "counted"
            },
        );
        info!(
            offer_id = %instance.offer_id,
            instance_id = %instance.id,
            already_claimed = record.already_processed,
            counter = record.counter,
            next_at,
            "Offer claimed"
        );

        Ok(ClaimOfferResponse {
            contents: instance.contents,
            already_claimed: record.already_processed,
            next_at,
        })
    }

    // ==================== 曝光 ====================

    /// 记录优惠曝光
    #[instrument(
        skip(self, request),
        fields(
            game_id = %request.game_id,
            player_id = %request.player_id,
            instance_id = %request.instance_id
        )
    )]
    pub async fn view_offer(&self, request: &ViewOfferRequest) -> Result<ViewOfferResponse> {
        let game_id = request.game_id.as_str();
        let player_id = request.player_id.as_str();

        let instance = self
            .player_instance(game_id, player_id, request.instance_id)
            .await?;
        let template = self.load_template(game_id, instance.offer_id).await?;

        if !template.enabled {
            metrics::record_view(game_id, "disabled");
            info!(offer_id = %instance.offer_id, "View of disabled offer ignored");
            return Ok(ViewOfferResponse {
                already_viewed: false,
                next_at: 0,
            });
        }

        let frequency = template.parse_frequency()?;

        let offer_id = instance.offer_id.to_string();
        let record = with_timeout(
            self.store_timeout(),
            "kv.record_view",
            self.views
                .record_event(player_id, &offer_id, &request.impression_id, request.now),
        )
        .await?;

        // 投影写入单调且幂等，重放时也写入
        with_timeout(
            self.store_timeout(),
            "offer_players.record_counter",
            self.player_repo.record_counter(
                game_id,
                player_id,
                instance.offer_id,
                EventKind::View,
                record.counter,
                record.timestamp,
            ),
        )
        .await?;

        let next_at = policy::next_view_at(&frequency, record.counter, record.timestamp)?;

        metrics::record_view(
            game_id,
            if record.already_processed {
                "replayed"
            } else {
                "counted"
            },
        );

        Ok(ViewOfferResponse {
            already_viewed: record.already_processed,
            next_at,
        })
    }

    // ==================== 查询 ====================

    /// 获取实例详情
    ///
    /// 实例快照与模板当前的 metadata、生效窗口合并
    #[instrument(skip(self))]
    pub async fn get_offer_info(&self, game_id: &str, instance_id: Uuid) -> Result<OfferToReturn> {
        let instance = with_timeout(
            self.store_timeout(),
            "offer_instances.get_by_id",
            self.instance_repo.get_by_id(game_id, instance_id),
        )
        .await?
        .ok_or_else(|| {
            OfferError::not_found(
                "OfferInstance",
                [("game_id", game_id), ("id", &instance_id.to_string())],
            )
        })?;

        let template = self.load_template(game_id, instance.offer_id).await?;
        let trigger = template.parse_trigger()?;

        Ok(OfferToReturn {
            id: instance.id,
            product_id: instance.product_id,
            cost: instance.cost,
            contents: instance.contents,
            metadata: template.metadata,
            expire_at: trigger.expire_at(),
        })
    }

    // ==================== 内部辅助 ====================

    /// 读取属于该玩家的实例，其他玩家的实例按不存在处理
    async fn player_instance(
        &self,
        game_id: &str,
        player_id: &str,
        instance_id: Uuid,
    ) -> Result<OfferInstance> {
        let instance = with_timeout(
            self.store_timeout(),
            "offer_instances.get_by_id",
            self.instance_repo.get_by_id(game_id, instance_id),
        )
        .await?;

        instance
            .filter(|instance| instance.player_id == player_id)
            .ok_or_else(|| {
                OfferError::not_found(
                    "OfferInstance",
                    [
                        ("game_id", game_id),
                        ("player_id", player_id),
                        ("id", &instance_id.to_string()),
                    ],
                )
            })
    }

    async fn latest_product_instance(
        &self,
        game_id: &str,
        player_id: &str,
        product_id: &str,
        before: i64,
    ) -> Result<OfferInstance> {
        with_timeout(
            self.store_timeout(),
            "offer_instances.find_latest_by_product",
            self.instance_repo
                .find_latest_by_product(game_id, player_id, product_id, before),
        )
        .await?
        .ok_or_else(|| {
            OfferError::not_found(
                "OfferInstance",
                [
                    ("game_id", game_id),
                    ("player_id", player_id),
                    ("product_id", product_id),
                ],
            )
        })
    }

    async fn load_template(&self, game_id: &str, offer_id: Uuid) -> Result<OfferTemplate> {
        with_timeout(
            self.store_timeout(),
            "offers.get_template",
            self.template_repo.get_template(game_id, offer_id),
        )
        .await?
        .ok_or_else(|| {
            OfferError::not_found(
                "OfferTemplate",
                [("game_id", game_id), ("id", &offer_id.to_string())],
            )
        })
    }
}
