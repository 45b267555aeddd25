//! 领取 / 曝光端到端流程（内存存储）

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{GAME_ID, Harness, PLAYER_ID, template};
use offer_engine::dto::{ClaimOfferRequest, ClaimTarget, ViewOfferRequest};
use offer_engine::repository::OfferPlayerRepositoryTrait;
use offer_engine::{
    EventKind, FilterAttributes, MemoryEventStore, MemoryInstanceRepository,
    MemoryPlayerRepository, MemoryTemplateRepository, OfferError, OfferPlayer, OfferService,
};
use offers_shared::config::OffersConfig;
use serde_json::json;
use uuid::Uuid;

/// 第一次写入计数失败，之后委托给内存仓储
#[derive(Default)]
struct FlakyPlayerRepository {
    inner: MemoryPlayerRepository,
    failed: AtomicBool,
}

#[async_trait]
impl OfferPlayerRepositoryTrait for FlakyPlayerRepository {
    async fn list_by_player(
        &self,
        game_id: &str,
        player_id: &str,
    ) -> offer_engine::Result<Vec<OfferPlayer>> {
        self.inner.list_by_player(game_id, player_id).await
    }

    async fn record_counter(
        &self,
        game_id: &str,
        player_id: &str,
        offer_id: Uuid,
        kind: EventKind,
        counter: i64,
        timestamp: i64,
    ) -> offer_engine::Result<()> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(OfferError::StorageUnavailable("connection reset".to_string()));
        }
        self.inner
            .record_counter(game_id, player_id, offer_id, kind, counter, timestamp)
            .await
    }
}

fn claim(instance_id: Uuid, transaction_id: &str, timestamp: i64) -> ClaimOfferRequest {
    ClaimOfferRequest {
        game_id: GAME_ID.to_string(),
        player_id: PLAYER_ID.to_string(),
        target: ClaimTarget::Instance { id: instance_id },
        transaction_id: transaction_id.to_string(),
        timestamp,
    }
}

fn view(instance_id: Uuid, impression_id: &str, now: i64) -> ViewOfferRequest {
    ViewOfferRequest {
        game_id: GAME_ID.to_string(),
        player_id: PLAYER_ID.to_string(),
        instance_id,
        impression_id: impression_id.to_string(),
        now,
    }
}

async fn offered_instance(harness: &Harness, placement: &str, now: i64) -> Uuid {
    let offers = harness
        .service
        .get_available_offers(GAME_ID, PLAYER_ID, now, FilterAttributes::new())
        .await
        .unwrap();
    offers[placement][0].id
}

#[tokio::test]
async fn test_claim_replay_and_next_claim_scenario() {
    let harness = Harness::new();
    let mut starter = template("starter", "popup");
    starter.frequency = json!({"every": "1s"});
    harness.templates.upsert(starter);

    let instance_id = offered_instance(&harness, "popup", 100).await;

    let first = harness
        .service
        .claim_offer(&claim(instance_id, "tx-A", 100))
        .await
        .unwrap();
    assert!(!first.already_claimed);
    assert_eq!(first.next_at, 101);

    let replay = harness
        .service
        .claim_offer(&claim(instance_id, "tx-A", 100))
        .await
        .unwrap();
    assert!(replay.already_claimed);
    assert_eq!(replay.next_at, 101);
    assert_eq!(replay.contents, first.contents);

    let second = harness
        .service
        .claim_offer(&claim(instance_id, "tx-B", 101))
        .await
        .unwrap();
    assert!(!second.already_claimed);
    assert_eq!(second.next_at, 102);
}

#[tokio::test]
async fn test_replay_at_later_time_returns_original_next_at() {
    let harness = Harness::new();
    let mut starter = template("starter", "popup");
    starter.period = json!({"every": "1h"});
    harness.templates.upsert(starter.clone());

    let t0 = 1_700_000_000;
    let instance_id = offered_instance(&harness, "popup", t0).await;
    let first = harness
        .service
        .claim_offer(&claim(instance_id, "tx-A", t0))
        .await
        .unwrap();
    assert_eq!(first.next_at, t0 + 3_600);

    let replay = harness
        .service
        .claim_offer(&claim(instance_id, "tx-A", t0 + 5_000))
        .await
        .unwrap();
    assert_eq!(replay.next_at, first.next_at);
    assert_eq!(
        harness
            .events
            .snapshot(EventKind::Claim, PLAYER_ID, &starter.id.to_string()),
        (1, t0)
    );
}

#[tokio::test]
async fn test_period_max_removes_offer_after_claim() {
    let harness = Harness::new();
    let mut once = template("once", "popup");
    once.period = json!({"max": 1});
    harness.templates.upsert(once);

    let instance_id = offered_instance(&harness, "popup", 100).await;
    let response = harness
        .service
        .claim_offer(&claim(instance_id, "tx-1", 100))
        .await
        .unwrap();
    assert_eq!(response.next_at, 0);

    for now in [100, 101, 10_000, 1_000_000] {
        let offers = harness
            .service
            .get_available_offers(GAME_ID, PLAYER_ID, now, FilterAttributes::new())
            .await
            .unwrap();
        assert!(offers.is_empty(), "offer reappeared at {}", now);
    }
}

#[tokio::test]
async fn test_cooldown_hides_offer_until_expiry() {
    let harness = Harness::new();
    let mut daily = template("daily", "store");
    daily.period = json!({"every": "24h"});
    harness.templates.upsert(daily);

    let t0 = 1_700_000_000;
    let instance_id = offered_instance(&harness, "store", t0).await;
    harness
        .service
        .claim_offer(&claim(instance_id, "tx-1", t0))
        .await
        .unwrap();

    let hidden = harness
        .service
        .get_available_offers(GAME_ID, PLAYER_ID, t0 + 3_600, FilterAttributes::new())
        .await
        .unwrap();
    assert!(hidden.is_empty());

    let back = harness
        .service
        .get_available_offers(GAME_ID, PLAYER_ID, t0 + 86_400, FilterAttributes::new())
        .await
        .unwrap();
    // 同一版本复用同一实例
    assert_eq!(back["store"][0].id, instance_id);
}

#[tokio::test]
async fn test_view_frequency_limits_visibility() {
    let harness = Harness::new();
    let mut banner = template("banner", "popup");
    banner.frequency = json!({"every": "10s", "max": 2});
    harness.templates.upsert(banner);

    let instance_id = offered_instance(&harness, "popup", 100).await;

    let first = harness
        .service
        .view_offer(&view(instance_id, "imp-1", 100))
        .await
        .unwrap();
    assert!(!first.already_viewed);
    assert_eq!(first.next_at, 110);

    let replay = harness
        .service
        .view_offer(&view(instance_id, "imp-1", 105))
        .await
        .unwrap();
    assert!(replay.already_viewed);
    assert_eq!(replay.next_at, 110);

    let second = harness
        .service
        .view_offer(&view(instance_id, "imp-2", 120))
        .await
        .unwrap();
    assert_eq!(second.next_at, 0);

    let offers = harness
        .service
        .get_available_offers(GAME_ID, PLAYER_ID, 500, FilterAttributes::new())
        .await
        .unwrap();
    assert!(offers.is_empty());
}

#[tokio::test]
async fn test_new_version_keeps_counters_and_issues_new_instance() {
    let harness = Harness::new();
    let mut pack = template("pack", "popup");
    pack.period = json!({"max": 2});
    let offer_id = pack.id;
    harness.templates.upsert(pack);

    let v1_instance = offered_instance(&harness, "popup", 100).await;
    harness
        .service
        .claim_offer(&claim(v1_instance, "tx-1", 100))
        .await
        .unwrap();

    harness
        .templates
        .update(offer_id, |t| t.contents = json!({"gems": 200}));

    let offers = harness
        .service
        .get_available_offers(GAME_ID, PLAYER_ID, 200, FilterAttributes::new())
        .await
        .unwrap();
    let v2_instance = offers["popup"][0].id;
    assert_ne!(v1_instance, v2_instance);
    assert_eq!(offers["popup"][0].contents, json!({"gems": 200}));

    // 计数跟随模板：第二次领取后达到上限
    let response = harness
        .service
        .claim_offer(&claim(v2_instance, "tx-2", 200))
        .await
        .unwrap();
    assert_eq!(response.next_at, 0);
    assert!(
        harness
            .service
            .get_available_offers(GAME_ID, PLAYER_ID, 300, FilterAttributes::new())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_claim_by_product_uses_latest_instance_before_timestamp() {
    let harness = Harness::new();
    let pack = template("pack", "popup");
    let offer_id = pack.id;
    harness.templates.upsert(pack);

    harness.instances.set_created_at(100);
    let v1_instance = offered_instance(&harness, "popup", 100).await;

    harness
        .templates
        .update(offer_id, |t| t.contents = json!({"gems": 300}));
    harness.instances.set_created_at(200);
    let v2_instance = offered_instance(&harness, "popup", 200).await;
    assert_ne!(v1_instance, v2_instance);

    let by_product = |transaction_id: &str, timestamp| ClaimOfferRequest {
        game_id: GAME_ID.to_string(),
        player_id: PLAYER_ID.to_string(),
        target: ClaimTarget::Product {
            product_id: "com.game.pack".to_string(),
        },
        transaction_id: transaction_id.to_string(),
        timestamp,
    };

    let early = harness
        .service
        .claim_offer(&by_product("tx-1", 150))
        .await
        .unwrap();
    assert_eq!(early.contents["gems"], 100);

    let late = harness
        .service
        .claim_offer(&by_product("tx-2", 250))
        .await
        .unwrap();
    assert_eq!(late.contents["gems"], 300);

    let err = harness
        .service
        .claim_offer(&by_product("tx-3", 50))
        .await
        .unwrap_err();
    assert!(matches!(err, OfferError::NotFound { .. }));
}

#[tokio::test]
async fn test_view_of_disabled_offer_is_not_counted() {
    let harness = Harness::new();
    let banner = template("banner", "popup");
    let offer_id = banner.id;
    harness.templates.upsert(banner);

    let instance_id = offered_instance(&harness, "popup", 100).await;
    harness.templates.update(offer_id, |t| t.enabled = false);

    let response = harness
        .service
        .view_offer(&view(instance_id, "imp-1", 100))
        .await
        .unwrap();
    assert!(!response.already_viewed);
    assert_eq!(response.next_at, 0);
    assert_eq!(
        harness
            .events
            .snapshot(EventKind::View, PLAYER_ID, &offer_id.to_string()),
        (0, 0)
    );
}

#[tokio::test]
async fn test_offer_info() {
    let harness = Harness::new();
    let mut limited = template("limited", "popup");
    limited.trigger = json!({"from": 0, "to": 9_999});
    harness.templates.upsert(limited);

    let instance_id = offered_instance(&harness, "popup", 100).await;
    let info = harness
        .service
        .get_offer_info(GAME_ID, instance_id)
        .await
        .unwrap();
    assert_eq!(info.id, instance_id);
    assert_eq!(info.expire_at, 9_999);
    assert_eq!(info.product_id, "com.game.limited");
    assert_eq!(info.metadata, json!({"title": "limited"}));

    let err = harness
        .service
        .get_offer_info("other-game", instance_id)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_retry_after_failed_projection_write_hides_claimed_offer() {
    let templates = MemoryTemplateRepository::new();
    let events = MemoryEventStore::new();
    let service = OfferService::new(
        Arc::new(templates.clone()),
        Arc::new(MemoryInstanceRepository::new()),
        Arc::new(FlakyPlayerRepository::default()),
        Arc::new(events.clone()),
        OffersConfig {
            cache_ttl_seconds: 0,
            ..OffersConfig::default()
        },
    );

    let mut once = template("once", "popup");
    once.period = json!({"max": 1});
    let offer_id = once.id;
    templates.upsert(once);

    let offers = service
        .get_available_offers(GAME_ID, PLAYER_ID, 100, FilterAttributes::new())
        .await
        .unwrap();
    let instance_id = offers["popup"][0].id;

    // 键值存储已计数，投影写入失败
    let err = service
        .claim_offer(&claim(instance_id, "tx-1", 100))
        .await
        .unwrap_err();
    assert!(err.is_storage_error());
    assert_eq!(
        events.snapshot(EventKind::Claim, PLAYER_ID, &offer_id.to_string()),
        (1, 100)
    );

    // 客户端重试：按重放处理，同时补写投影
    let retry = service
        .claim_offer(&claim(instance_id, "tx-1", 100))
        .await
        .unwrap();
    assert!(retry.already_claimed);
    assert_eq!(retry.next_at, 0);

    let offers = service
        .get_available_offers(GAME_ID, PLAYER_ID, 200, FilterAttributes::new())
        .await
        .unwrap();
    assert!(offers.is_empty());
}
