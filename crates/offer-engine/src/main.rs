//! 优惠引擎运维命令行
//!
//! 直接连接 PostgreSQL 与 Redis 调用核心服务，结果以 JSON 输出。
//! 用于排查线上玩家的可用优惠与领取状态，不是对外接口。

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use offers_shared::{config::AppConfig, database::Database, kv::KvStore, observability};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use offer_engine::dto::{ClaimOfferRequest, ClaimTarget, ViewOfferRequest};
use offer_engine::{
    EventKind, FilterAttributes, OfferInstanceRepository, OfferPlayerRepository, OfferService,
    OfferTemplateRepository, RedisEventStore,
};

type Service = OfferService<
    OfferTemplateRepository,
    OfferInstanceRepository,
    OfferPlayerRepository,
    RedisEventStore,
>;

/// 优惠引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "offers-cli")]
#[command(version, about = "优惠资格与领取排查工具")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 检查数据库与 Redis 连通性
    Health,

    /// 执行数据库迁移
    Migrate,

    /// 计算玩家当前可用的优惠
    Available {
        #[arg(long)]
        game_id: String,

        #[arg(long)]
        player_id: String,

        /// 评估时间（unix 秒），默认当前时间
        #[arg(long)]
        now: Option<i64>,

        /// 过滤属性，形如 region=us，可重复
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, String)>,
    },

    /// 领取优惠
    ///
    /// --instance-id 与 --product-id 二选一
    Claim {
        #[arg(long)]
        game_id: String,

        #[arg(long)]
        player_id: String,

        #[arg(long, conflicts_with = "product_id")]
        instance_id: Option<Uuid>,

        #[arg(long)]
        product_id: Option<String>,

        /// 交易号
        #[arg(long)]
        transaction_id: String,

        /// 购买时间（unix 秒），默认当前时间
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// 记录优惠曝光
    View {
        #[arg(long)]
        game_id: String,

        #[arg(long)]
        player_id: String,

        #[arg(long)]
        instance_id: Uuid,

        /// 曝光号
        #[arg(long)]
        impression_id: String,

        #[arg(long)]
        now: Option<i64>,
    },

    /// 对比键值存储中的权威计数与关系库计数投影
    Counters {
        #[arg(long)]
        game_id: String,

        #[arg(long)]
        player_id: String,

        /// 模板 ID
        #[arg(long)]
        offer_id: Uuid,
    },

    /// 查看优惠实例详情
    Info {
        #[arg(long)]
        game_id: String,

        #[arg(long)]
        instance_id: Uuid,
    },
}

fn parse_attr(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load("offers-cli").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    observability::init(&config.observability)?;

    let db = Database::connect(&config.database)
        .await
        .context("connect to database")?;
    let kv = KvStore::new(&config.redis).context("create redis client")?;

    if let Commands::Migrate = cli.command {
        let outcome = db.run_migrations().await;
        db.close().await;
        return outcome.context("run migrations");
    }

    if let Commands::Counters {
        game_id,
        player_id,
        offer_id,
    } = &cli.command
    {
        let outcome = print_counters(&db, &kv, game_id, player_id, *offer_id).await;
        db.close().await;
        return outcome;
    }

    if let Commands::Health = cli.command {
        let database = db.health_check().await;
        let redis = kv.health_check().await;
        let healthy = database.is_ok() && redis.is_ok();
        print_json(&serde_json::json!({
            "database": database.map(|_| "ok".to_string()).unwrap_or_else(|e| e.to_string()),
            "redis": redis.map(|_| "ok".to_string()).unwrap_or_else(|e| e.to_string()),
        }))?;
        db.close().await;
        if !healthy {
            bail!("unhealthy");
        }
        return Ok(());
    }

    let service: Service = OfferService::new(
        Arc::new(OfferTemplateRepository::new(db.pool().clone())),
        Arc::new(OfferInstanceRepository::new(db.pool().clone())),
        Arc::new(OfferPlayerRepository::new(db.pool().clone())),
        Arc::new(RedisEventStore::new(kv)),
        config.offers.clone(),
    );

    let outcome = run(&service, cli.command).await;
    db.close().await;
    outcome
}

/// 投影落后于键值存储时，说明有投影写入失败且尚未被重试补齐
async fn print_counters(
    db: &Database,
    kv: &KvStore,
    game_id: &str,
    player_id: &str,
    offer_id: Uuid,
) -> Result<()> {
    let events = RedisEventStore::new(kv.clone());
    let offer_key = offer_id.to_string();
    let (claim_counter, claim_timestamp) = events
        .snapshot(EventKind::Claim, player_id, &offer_key)
        .await?;
    let (view_counter, view_timestamp) = events
        .snapshot(EventKind::View, player_id, &offer_key)
        .await?;

    let projection = OfferPlayerRepository::new(db.pool().clone())
        .get_player(game_id, player_id, offer_id)
        .await?;

    print_json(&serde_json::json!({
        "kv": {
            "claimCounter": claim_counter,
            "claimTimestamp": claim_timestamp,
            "viewCounter": view_counter,
            "viewTimestamp": view_timestamp,
        },
        "projection": projection,
    }))
}

async fn run(service: &Service, command: Commands) -> Result<()> {
    match command {
        Commands::Health | Commands::Migrate | Commands::Counters { .. } => Ok(()),
        Commands::Available {
            game_id,
            player_id,
            now,
            attrs,
        } => {
            let now = now.unwrap_or_else(|| Utc::now().timestamp());
            let attrs: FilterAttributes = attrs.into_iter().collect();
            let offers = service
                .get_available_offers(&game_id, &player_id, now, attrs)
                .await?;
            info!(placements = offers.len(), "Available offers computed");
            print_json(&offers)
        }
        Commands::Claim {
            game_id,
            player_id,
            instance_id,
            product_id,
            transaction_id,
            timestamp,
        } => {
            let target = match (instance_id, product_id) {
                (Some(id), _) => ClaimTarget::Instance { id },
                (None, Some(product_id)) => ClaimTarget::Product { product_id },
                (None, None) => bail!("either --instance-id or --product-id is required"),
            };
            let request = ClaimOfferRequest {
                game_id,
                player_id,
                target,
                transaction_id,
                timestamp: timestamp.unwrap_or_else(|| Utc::now().timestamp()),
            };
            let response = service.claim_offer(&request).await?;
            if response.already_claimed {
                warn!("Transaction already processed");
            }
            print_json(&response)
        }
        Commands::View {
            game_id,
            player_id,
            instance_id,
            impression_id,
            now,
        } => {
            let request = ViewOfferRequest {
                game_id,
                player_id,
                instance_id,
                impression_id,
                now: now.unwrap_or_else(|| Utc::now().timestamp()),
            };
            print_json(&service.view_offer(&request).await?)
        }
        Commands::Info {
            game_id,
            instance_id,
        } => print_json(&service.get_offer_info(&game_id, instance_id).await?),
    }
}
