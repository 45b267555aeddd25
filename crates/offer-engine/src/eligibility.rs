//! 可用优惠计算
//!
//! 单次调用流程：
//!
//! 1. 读取游戏下启用的模板（读穿缓存，按名称升序）
//! 2. 剔除触发窗口不包含 now 的模板
//! 3. 剔除过滤属性不匹配的模板
//! 4. 读取玩家计数并做频率 / 周期评估
//! 5. 每个展示位只保留按名称顺序第一个通过的模板
//! 6. 为胜出模板查找或创建实例，组装返回结果
//!
//! 未知游戏或没有满足条件的模板时返回空结果；任何解码或存储错误中止整个调用。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use offers_shared::observability::metrics;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{OfferError, Result};
use crate::filter::{FilterAttributes, sanitize_attributes};
use crate::models::{NewOfferInstance, OfferTemplate, OfferToReturn, PlayerCounters};
use crate::policy;
use crate::repository::{
    OfferInstanceRepositoryTrait, OfferPlayerRepositoryTrait, OfferTemplateRepositoryTrait,
};
use crate::template_cache::TemplateCache;
use crate::timeout::with_timeout;
use crate::trigger::{Trigger, is_triggered};

/// 展示位 → 该展示位的优惠列表
pub type AvailableOffers = BTreeMap<String, Vec<OfferToReturn>>;

/// 可用优惠查询参数
#[derive(Debug, Clone, Default)]
pub struct AvailableOffersQuery {
    pub game_id: String,
    pub player_id: String,
    /// 当前时间（unix 秒）
    pub now: i64,
    /// 模板缓存有效期，0 表示不缓存
    pub cache_ttl: Duration,
    pub filter_attrs: FilterAttributes,
    /// 未声明的属性视为通配
    pub allow_wildcard_filter_match: bool,
}

/// 资格评估引擎
pub struct EligibilityEngine<TR, IR, PR>
where
    TR: OfferTemplateRepositoryTrait,
    IR: OfferInstanceRepositoryTrait,
    PR: OfferPlayerRepositoryTrait,
{
    template_repo: Arc<TR>,
    instance_repo: Arc<IR>,
    player_repo: Arc<PR>,
    cache: TemplateCache,
    store_timeout: Duration,
}

impl<TR, IR, PR> EligibilityEngine<TR, IR, PR>
where
    TR: OfferTemplateRepositoryTrait,
    IR: OfferInstanceRepositoryTrait,
    PR: OfferPlayerRepositoryTrait,
{
    pub fn new(
        template_repo: Arc<TR>,
        instance_repo: Arc<IR>,
        player_repo: Arc<PR>,
        cache: TemplateCache,
        store_timeout: Duration,
    ) -> Self {
        Self {
            template_repo,
            instance_repo,
            player_repo,
            cache,
            store_timeout,
        }
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// 计算玩家当前可用的优惠
    #[instrument(
        skip(self, query),
        fields(game_id = %query.game_id, player_id = %query.player_id, now = query.now)
    )]
    pub async fn get_available_offers(&self, query: &AvailableOffersQuery) -> Result<AvailableOffers> {
        let game_id = query.game_id.as_str();
        let templates = self
            .cache
            .get_or_load(game_id, query.cache_ttl, || {
                with_timeout(
                    self.store_timeout,
                    "offers.list_enabled",
                    self.template_repo.list_enabled_by_game(game_id),
                )
            })
            .await?;

        if templates.is_empty() {
            debug!("No enabled templates");
            return Ok(AvailableOffers::new());
        }

        let attrs = sanitize_attributes(query.filter_attrs.clone());

        // 触发窗口与过滤属性
        let mut candidates: Vec<(&OfferTemplate, Trigger)> = Vec::new();
        for template in templates.iter() {
            let trigger = template.parse_trigger()?;
            if !is_triggered(&trigger, query.now) {
                continue;
            }
            let filters = template.parse_filters()?;
            if !filters.matches(&attrs, query.allow_wildcard_filter_match) {
                continue;
            }
            candidates.push((template, trigger));
        }

        if candidates.is_empty() {
            return Ok(AvailableOffers::new());
        }

        let counters = self.load_counters(game_id, &query.player_id).await?;

        // 频率 / 周期评估，每个展示位保留第一个通过者
        let mut winners: BTreeMap<&str, (&OfferTemplate, Trigger)> = BTreeMap::new();
        for (template, trigger) in candidates {
            let frequency = template.parse_frequency()?;
            let period = template.parse_period()?;
            let player_counters = counters.get(&template.id).copied().unwrap_or_default();

            let eligibility = policy::evaluate(&frequency, &period, &player_counters, query.now)?;
            if !eligibility.eligible {
                debug!(
                    offer_id = %template.id,
                    next_at = eligibility.next_at,
                    "Template not eligible"
                );
                continue;
            }
            winners
                .entry(template.placement.as_str())
                .or_insert((template, trigger));
        }

        // 为胜出者物化实例
        let materialized = try_join_all(winners.into_iter().map(|(placement, (template, trigger))| {
            let new_instance = NewOfferInstance::from_template(template, &query.player_id);
            async move {
                let instance = with_timeout(
                    self.store_timeout,
                    "offer_instances.find_or_create",
                    self.instance_repo.find_or_create(&new_instance),
                )
                .await?;

                let offer = OfferToReturn {
                    id: instance.id,
                    product_id: template.product_id.clone(),
                    cost: template.cost.clone(),
                    contents: instance.contents,
                    metadata: template.metadata.clone(),
                    expire_at: trigger.expire_at(),
                };
                Ok::<_, OfferError>((placement.to_string(), offer))
            }
        }))
        .await?;

        metrics::record_available_offers(game_id, materialized.len());

        let mut offers = AvailableOffers::new();
        for (placement, offer) in materialized {
            offers.entry(placement).or_default().push(offer);
        }
        Ok(offers)
    }

    async fn load_counters(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> Result<HashMap<Uuid, PlayerCounters>> {
        let rows = with_timeout(
            self.store_timeout,
            "offer_players.list_by_player",
            self.player_repo.list_by_player(game_id, player_id),
        )
        .await?;

        Ok(rows.into_iter().map(|row| (row.offer_id, row.counters())).collect())
    }
}
