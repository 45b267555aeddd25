//! 集成测试公共构造

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use offer_engine::{
    MemoryEventStore, MemoryInstanceRepository, MemoryPlayerRepository, MemoryTemplateRepository,
    OfferService, OfferTemplate,
};
use offers_shared::config::OffersConfig;
use serde_json::{Value, json};
use uuid::Uuid;

pub const GAME_ID: &str = "game-1";
pub const PLAYER_ID: &str = "player-1";

pub type MemoryOfferService = OfferService<
    MemoryTemplateRepository,
    MemoryInstanceRepository,
    MemoryPlayerRepository,
    MemoryEventStore,
>;

/// 内存环境：服务与各存储的句柄
pub struct Harness {
    pub templates: MemoryTemplateRepository,
    pub instances: MemoryInstanceRepository,
    pub players: MemoryPlayerRepository,
    pub events: MemoryEventStore,
    pub service: Arc<MemoryOfferService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OffersConfig {
            // 测试中模板会被修改，不走缓存
            cache_ttl_seconds: 0,
            ..OffersConfig::default()
        })
    }

    pub fn with_config(config: OffersConfig) -> Self {
        let templates = MemoryTemplateRepository::new();
        let instances = MemoryInstanceRepository::new();
        let players = MemoryPlayerRepository::new();
        let events = MemoryEventStore::new();

        let service = Arc::new(OfferService::new(
            Arc::new(templates.clone()),
            Arc::new(instances.clone()),
            Arc::new(players.clone()),
            Arc::new(events.clone()),
            config,
        ));

        Self {
            templates,
            instances,
            players,
            events,
            service,
        }
    }
}

/// 构造一个始终生效、无频率与周期限制的模板
pub fn template(name: &str, placement: &str) -> OfferTemplate {
    OfferTemplate {
        id: Uuid::new_v4(),
        game_id: GAME_ID.to_string(),
        key: Uuid::new_v4(),
        name: name.to_string(),
        product_id: format!("com.game.{}", name),
        contents: json!({"gems": 100, "name": name}),
        cost: json!({"usd": 4.99}),
        metadata: json!({"title": name}),
        period: json!({}),
        frequency: json!({}),
        trigger: Value::Null,
        placement: placement.to_string(),
        filters: json!({}),
        enabled: true,
        version: 1,
        created_at: Utc::now(),
    }
}
