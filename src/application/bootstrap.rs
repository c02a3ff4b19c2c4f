//! Dependency wiring for the orchestrator, leader elector, and scheduler
//! (§6), grounded on `Zuytan-rustrade`'s `application/bootstrap/services.rs`
//! `XBootstrap::init()` -> `XHandle` shape.

use crate::application::engine::Engine;
use crate::application::executor::OrderExecutor;
use crate::application::intake::DedupCache;
use crate::application::leader_election::LeaderElector;
use crate::application::scheduler::eod_monitor::EodMonitor;
use crate::application::scheduler::heartbeat::HeartbeatWriter;
use crate::application::scheduler::rollover::{RolloverExecutor, RolloverScanner};
use crate::application::scheduler::Scheduler;
use crate::config::Config;
use crate::domain::instrument::Instrument;
use crate::domain::ports::{BrokerPort, Clock, NotifierPort, SystemClock};
use crate::infrastructure::broker::MockBroker;
use crate::infrastructure::calendar::MarketCalendar;
use crate::infrastructure::notifier::{NullNotifier, WebhookNotifier};
use crate::infrastructure::persistence::repositories::{
    PgCapitalTransactionRepository, PgInstanceMetadataRepository, PgOrderExecutionLogRepository,
    PgPortfolioRepository, PgPositionRepository, PgPyramidingRepository, PgSignalAuditRepository,
};
use crate::infrastructure::persistence::Database;
use crate::infrastructure::redis_lock::RedisLeaderLock;
use anyhow::Result;
use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything `bin/server.rs` needs to start serving: the engine for the
/// HTTP webhook handlers, the leader elector's renewal loop, and the
/// scheduler for background jobs. All three share one `Engine`.
pub struct AppHandle {
    pub engine: Arc<Engine>,
    pub leader_elector: Arc<LeaderElector>,
    pub scheduler: Arc<Scheduler>,
    pub config: Arc<Config>,
}

pub struct AppBootstrap;

impl AppBootstrap {
    pub async fn init(config: Config) -> Result<AppHandle> {
        let config = Arc::new(config);
        let db = Database::new(&config.persistence.database_url, config.persistence.max_connections).await?;
        let pool = db.pool.clone();

        let portfolio_repo = Arc::new(PgPortfolioRepository::new(pool.clone()));
        if portfolio_repo.load().await.is_err() {
            portfolio_repo.seed(config.initial_capital).await?;
        }

        let position_repo = Arc::new(PgPositionRepository::new(pool.clone()));
        let pyramiding_repo = Arc::new(PgPyramidingRepository::new(pool.clone()));
        let audit_repo = Arc::new(PgSignalAuditRepository::new(pool.clone()));
        let order_log_repo = Arc::new(PgOrderExecutionLogRepository::new(pool.clone()));
        let capital_repo = Arc::new(PgCapitalTransactionRepository::new(pool.clone()));
        let instance_repo = Arc::new(PgInstanceMetadataRepository::new(pool.clone()));

        let broker: Arc<dyn BrokerPort> = Arc::new(MockBroker::new(dec!(100)));
        let executor = OrderExecutor::new(broker, config.execution.clone());

        let notifier: Arc<dyn NotifierPort> = match config.observability.webhook_url.as_deref() {
            Some(url) if !url.is_empty() => Arc::new(WebhookNotifier::new(url.to_string())),
            _ => Arc::new(NullNotifier),
        };

        let calendar = Arc::new(MarketCalendar::new(
            config.market_hours.clone(),
            Vec::new(),
            Vec::new(),
        ));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let dedup_cache = Arc::new(DedupCache::new());
        let instruments = Instrument::catalog();

        let is_leader = Arc::new(AtomicBool::new(false));
        let trading_paused = Arc::new(AtomicBool::new(false));

        let engine = Arc::new(Engine {
            clock: clock.clone(),
            calendar: calendar.clone(),
            dedup_cache,
            config: config.clone(),
            instruments,
            portfolio_repo,
            position_repo,
            pyramiding_repo,
            audit_repo: audit_repo.clone(),
            order_log_repo: order_log_repo.clone(),
            capital_repo,
            executor,
            notifier,
            instance_id: config.observability.instance_id.clone(),
            trading_paused,
            is_leader: is_leader.clone(),
        });

        let redis = RedisLeaderLock::connect(
            &config.persistence.redis_url,
            "trend_portfolio_engine:leader".to_string(),
            config.persistence.leader_lock_ttl_seconds,
        )
        .await?;
        let leader_elector = Arc::new(LeaderElector::new(
            redis,
            instance_repo.clone(),
            config.observability.instance_id.clone(),
            (config.persistence.leader_lock_ttl_seconds * 3) as i64,
            is_leader,
        ));

        let rollover_scanner = RolloverScanner::new(engine.clone(), config.rollover.clone());
        let rollover_executor = RolloverExecutor::new(engine.clone(), config.rollover.clone());
        let eod_monitor = EodMonitor::new(engine.clone(), calendar, config.eod.clone());
        let heartbeat = Arc::new(HeartbeatWriter::new(
            instance_repo,
            audit_repo,
            order_log_repo,
            config.observability.instance_id.clone(),
            engine.is_leader.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(
            rollover_scanner,
            rollover_executor,
            eod_monitor,
            heartbeat,
            Duration::from_secs(3600),
            Duration::from_secs(config.eod.condition_check_seconds),
            Duration::from_secs(5),
        ));

        info!(instance_id = %engine.instance_id, "application bootstrap complete");
        Ok(AppHandle { engine, leader_elector, scheduler, config })
    }
}
