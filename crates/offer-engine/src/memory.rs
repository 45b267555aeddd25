//! 内存存储
//!
//! 使用 DashMap 实现的仓储与事件存储，适用于测试和本地开发。
//! 与 PostgreSQL / Redis 实现提供相同的原子性：自然键查找或创建、
//! 事件检查加自增加入集合都在同一把分片锁内完成。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::idempotency::{EventRecord, EventStore};
use crate::models::{EventKind, NewOfferInstance, OfferInstance, OfferPlayer, OfferTemplate};
use crate::repository::{
    OfferInstanceRepositoryTrait, OfferPlayerRepositoryTrait, OfferTemplateRepositoryTrait,
};

// ==================== 模板 ====================

/// 内存模板仓储
#[derive(Clone, Default)]
pub struct MemoryTemplateRepository {
    templates: Arc<DashMap<Uuid, OfferTemplate>>,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆盖模板
    pub fn upsert(&self, template: OfferTemplate) {
        self.templates.insert(template.id, template);
    }

    /// 修改模板并自增版本号
    pub fn update<F>(&self, id: Uuid, mutate: F) -> bool
    where
        F: FnOnce(&mut OfferTemplate),
    {
        match self.templates.get_mut(&id) {
            Some(mut template) => {
                mutate(&mut template);
                template.version += 1;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl OfferTemplateRepositoryTrait for MemoryTemplateRepository {
    async fn list_enabled_by_game(&self, game_id: &str) -> Result<Vec<OfferTemplate>> {
        let mut templates: Vec<OfferTemplate> = self
            .templates
            .iter()
            .filter(|entry| entry.game_id == game_id && entry.enabled)
            .map(|entry| entry.value().clone())
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(templates)
    }

    async fn get_template(&self, game_id: &str, id: Uuid) -> Result<Option<OfferTemplate>> {
        Ok(self
            .templates
            .get(&id)
            .filter(|template| template.game_id == game_id)
            .map(|template| template.value().clone()))
    }
}

// ==================== 实例 ====================

type InstanceKey = (String, String, Uuid, i32);

/// 内存实例仓储
#[derive(Clone, Default)]
pub struct MemoryInstanceRepository {
    by_key: Arc<DashMap<InstanceKey, OfferInstance>>,
    by_id: Arc<DashMap<Uuid, InstanceKey>>,
    clock: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl MemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定新实例的创建时间（unix 秒），用于按时间查找的测试
    pub fn set_created_at(&self, unix_seconds: i64) {
        *self.clock.write() = Utc.timestamp_opt(unix_seconds, 0).single();
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    fn now(&self) -> DateTime<Utc> {
        let fixed = *self.clock.read();
        fixed.unwrap_or_else(Utc::now)
    }
}

#[async_trait]
impl OfferInstanceRepositoryTrait for MemoryInstanceRepository {
    async fn find_or_create(&self, instance: &NewOfferInstance) -> Result<OfferInstance> {
        let key = (
            instance.game_id.clone(),
            instance.player_id.clone(),
            instance.offer_id,
            instance.offer_version,
        );

        // id 索引在自然键分片锁内写入，其他调用方拿到实例时索引已存在
        let stored = self
            .by_key
            .entry(key.clone())
            .or_insert_with(|| {
                let id = Uuid::new_v4();
                self.by_id.insert(id, key);
                OfferInstance {
                    id,
                    game_id: instance.game_id.clone(),
                    player_id: instance.player_id.clone(),
                    offer_id: instance.offer_id,
                    offer_version: instance.offer_version,
                    contents: instance.contents.clone(),
                    product_id: instance.product_id.clone(),
                    cost: instance.cost.clone(),
                    created_at: self.now(),
                }
            })
            .value()
            .clone();

        Ok(stored)
    }

    async fn get_by_id(&self, game_id: &str, id: Uuid) -> Result<Option<OfferInstance>> {
        let Some(key) = self.by_id.get(&id).map(|key| key.value().clone()) else {
            return Ok(None);
        };
        Ok(self
            .by_key
            .get(&key)
            .filter(|instance| instance.game_id == game_id)
            .map(|instance| instance.value().clone()))
    }

    async fn find_latest_by_product(
        &self,
        game_id: &str,
        player_id: &str,
        product_id: &str,
        before: i64,
    ) -> Result<Option<OfferInstance>> {
        Ok(self
            .by_key
            .iter()
            .filter(|entry| {
                entry.game_id == game_id
                    && entry.player_id == player_id
                    && entry.product_id == product_id
                    && entry.created_at.timestamp() < before
            })
            .map(|entry| entry.value().clone())
            .max_by_key(|instance| instance.created_at))
    }
}

// ==================== 玩家计数 ====================

type PlayerKey = (String, String, Uuid);

/// 内存玩家计数仓储
#[derive(Clone, Default)]
pub struct MemoryPlayerRepository {
    rows: Arc<DashMap<PlayerKey, OfferPlayer>>,
}

impl MemoryPlayerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfferPlayerRepositoryTrait for MemoryPlayerRepository {
    async fn list_by_player(&self, game_id: &str, player_id: &str) -> Result<Vec<OfferPlayer>> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.game_id == game_id && entry.player_id == player_id)
            .map(|entry| entry.value().clone())
            .collect())
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
        let key = (game_id.to_string(), player_id.to_string(), offer_id);
        let mut entry = self.rows.entry(key).or_insert_with(|| OfferPlayer {
            game_id: game_id.to_string(),
            player_id: player_id.to_string(),
            offer_id,
            claim_counter: 0,
            claim_timestamp: 0,
            view_counter: 0,
            view_timestamp: 0,
        });
        let row = &mut *entry;

        let (stored_counter, stored_timestamp) = match kind {
            EventKind::Claim => (&mut row.claim_counter, &mut row.claim_timestamp),
            EventKind::View => (&mut row.view_counter, &mut row.view_timestamp),
        };
        if counter >= *stored_counter {
            *stored_counter = counter;
            *stored_timestamp = timestamp;
        }
        Ok(())
    }
}

// ==================== 事件存储 ====================

#[derive(Default)]
struct EventState {
    counter: i64,
    timestamp: i64,
    tokens: HashSet<String>,
}

/// 内存事件计数存储
#[derive(Clone, Default)]
pub struct MemoryEventStore {
    events: Arc<DashMap<(EventKind, String, String), EventState>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取当前计数与时间戳
    pub fn snapshot(&self, kind: EventKind, player_id: &str, offer_id: &str) -> (i64, i64) {
        self.events
            .get(&(kind, player_id.to_string(), offer_id.to_string()))
            .map(|state| (state.counter, state.timestamp))
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn record(
        &self,
        kind: EventKind,
        player_id: &str,
        offer_id: &str,
        token: &str,
        now: i64,
    ) -> Result<EventRecord> {
        let mut state = self
            .events
            .entry((kind, player_id.to_string(), offer_id.to_string()))
            .or_default();

        if state.tokens.contains(token) {
            return Ok(EventRecord {
                already_processed: true,
                counter: state.counter,
                timestamp: state.timestamp,
            });
        }

        state.counter += 1;
        state.timestamp = now;
        state.tokens.insert(token.to_string());
        Ok(EventRecord {
            already_processed: false,
            counter: state.counter,
            timestamp: now,
        })
    }
}
