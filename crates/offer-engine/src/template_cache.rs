//! 模板读穿缓存
//!
//! 按 game_id 缓存启用模板列表，过期时间由调用方按游戏给出。
//! 模板变更后由管理端调用 `invalidate`；过期时间即最大陈旧度。
//! 每个游戏带一个代数，`invalidate` 递增代数，加载期间代数变化的结果不回填。

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use offers_shared::observability::metrics;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::OfferTemplate;

#[derive(Clone)]
struct CachedTemplates {
    templates: Arc<Vec<OfferTemplate>>,
    loaded_at: Instant,
}

/// 模板缓存
#[derive(Clone, Default)]
pub struct TemplateCache {
    entries: Arc<DashMap<String, CachedTemplates>>,
    generations: Arc<DashMap<String, u64>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取游戏的模板列表，未命中或过期时调用 `load` 并回填
    ///
    /// `ttl` 为 0 时不使用缓存
    #[instrument(skip(self, load))]
    pub async fn get_or_load<F, Fut>(
        &self,
        game_id: &str,
        ttl: Duration,
        load: F,
    ) -> Result<Arc<Vec<OfferTemplate>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<OfferTemplate>>>,
    {
        if ttl.is_zero() {
            return Ok(Arc::new(load().await?));
        }

        // 读取后立即释放分片锁，不跨 await 持有
        let cached = self
            .entries
            .get(game_id)
            .filter(|entry| entry.loaded_at.elapsed() < ttl)
            .map(|entry| Arc::clone(&entry.templates));

        if let Some(templates) = cached {
            metrics::record_template_cache(true);
            return Ok(templates);
        }

        metrics::record_template_cache(false);
        let generation = self.generation(game_id);
        let templates = Arc::new(load().await?);

        // 持有代数分片锁回填，与 invalidate 串行
        let current = self.generations.entry(game_id.to_string()).or_default();
        if *current == generation {
            self.entries.insert(
                game_id.to_string(),
                CachedTemplates {
                    templates: Arc::clone(&templates),
                    loaded_at: Instant::now(),
                },
            );
            debug!(count = templates.len(), "Template cache refreshed");
        } else {
            debug!("Template cache invalidated during load, result not cached");
        }
        Ok(templates)
    }

    fn generation(&self, game_id: &str) -> u64 {
        self.generations.get(game_id).map(|g| *g).unwrap_or_default()
    }

    /// 丢弃游戏的缓存条目，进行中的加载结果也不会回填
    pub fn invalidate(&self, game_id: &str) {
        let mut generation = self.generations.entry(game_id.to_string()).or_default();
        *generation += 1;
        if self.entries.remove(game_id).is_some() {
            debug!(game_id, "Template cache invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
