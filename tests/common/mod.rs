//! Shared in-memory fakes and a ready-to-run `Engine` harness, used by both
//! `tests/scenarios.rs` and `tests/engine.rs` so neither has to rebuild the
//! repository doubles from scratch. Modeled on `application::intake`'s own
//! `FakeAuditRepo` pattern.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use trend_portfolio_engine::application::engine::Engine;
use trend_portfolio_engine::application::executor::OrderExecutor;
use trend_portfolio_engine::application::intake::DedupCache;
use trend_portfolio_engine::config::Config;
use trend_portfolio_engine::domain::audit::{AuditOutcome, OrderExecutionLogEntry, SignalAudit};
use trend_portfolio_engine::domain::capital::CapitalTransaction;
use trend_portfolio_engine::domain::instrument::{Instrument, InstrumentId};
use trend_portfolio_engine::domain::ports::Clock;
use trend_portfolio_engine::domain::portfolio::PortfolioState;
use trend_portfolio_engine::domain::position::{
    ExecutionLegs, LimiterTag, Position, PositionStatus, RolloverStatus,
};
use trend_portfolio_engine::domain::pyramiding::PyramidingState;
use trend_portfolio_engine::domain::repositories::{
    CapitalTransactionRepository, OrderExecutionLogRepository, PortfolioRepository, PositionRepository,
    PyramidingRepository, SignalAuditRepository,
};
use trend_portfolio_engine::domain::signal::{Layer, Signal, SignalKind};
use trend_portfolio_engine::infrastructure::broker::MockBroker;
use trend_portfolio_engine::infrastructure::calendar::MarketCalendar;
use trend_portfolio_engine::infrastructure::notifier::NullNotifier;

/// 2026-08-17 10:00 UTC is a Monday inside both NSE and MCX session hours;
/// fixed so these scenarios never depend on the day they happen to run.
pub fn session_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 17, 10, 0, 0).unwrap()
}

/// A known Saturday, for tests that need the calendar gate to actually fire.
pub fn weekend_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 15, 10, 0, 0).unwrap()
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
pub struct InMemoryPortfolioRepo {
    pub state: Mutex<Option<PortfolioState>>,
}

#[async_trait]
impl PortfolioRepository for InMemoryPortfolioRepo {
    async fn load(&self) -> anyhow::Result<PortfolioState> {
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("portfolio not seeded"))
    }

    async fn save(&self, state: &PortfolioState, expected_version: i64) -> anyhow::Result<()> {
        let mut guard = self.state.lock().unwrap();
        let current_version = guard.as_ref().map(|s| s.version).unwrap_or(0);
        if current_version != expected_version {
            anyhow::bail!("version conflict: expected {expected_version}, found {current_version}");
        }
        let mut next = state.clone();
        next.version = expected_version + 1;
        *guard = Some(next);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPositionRepo {
    pub positions: Mutex<HashMap<String, Position>>,
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepo {
    async fn find_open(&self, instrument: InstrumentId, layer_label: &str) -> anyhow::Result<Option<Position>> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .values()
            .find(|p| p.instrument == instrument && p.layer.label() == layer_label && p.is_open())
            .cloned())
    }

    async fn find_all_open(&self) -> anyhow::Result<Vec<Position>> {
        Ok(self.positions.lock().unwrap().values().filter(|p| p.is_open()).cloned().collect())
    }

    async fn find_by_id(&self, position_id: &str) -> anyhow::Result<Option<Position>> {
        Ok(self.positions.lock().unwrap().get(position_id).cloned())
    }

    async fn save(&self, position: &Position, _expected_version: i64) -> anyhow::Result<()> {
        let mut next = position.clone();
        next.version += 1;
        self.positions.lock().unwrap().insert(next.position_id.clone(), next);
        Ok(())
    }

    async fn insert(&self, position: &Position) -> anyhow::Result<()> {
        self.positions.lock().unwrap().insert(position.position_id.clone(), position.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPyramidingRepo {
    pub state: Mutex<HashMap<InstrumentId, PyramidingState>>,
}

#[async_trait]
impl PyramidingRepository for InMemoryPyramidingRepo {
    async fn find(&self, instrument: InstrumentId) -> anyhow::Result<Option<PyramidingState>> {
        Ok(self.state.lock().unwrap().get(&instrument).cloned())
    }

    async fn upsert(&self, state: &PyramidingState) -> anyhow::Result<()> {
        self.state.lock().unwrap().insert(state.instrument, state.clone());
        Ok(())
    }

    async fn clear(&self, instrument: InstrumentId) -> anyhow::Result<()> {
        self.state.lock().unwrap().remove(&instrument);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepo {
    pub rows: Mutex<Vec<SignalAudit>>,
}

#[async_trait]
impl SignalAuditRepository for InMemoryAuditRepo {
    async fn fingerprint_exists(&self, fingerprint: &str) -> anyhow::Result<bool> {
        Ok(self.rows.lock().unwrap().iter().any(|a| a.fingerprint == fingerprint))
    }

    async fn record(&self, audit: &SignalAudit) -> anyhow::Result<()> {
        self.rows.lock().unwrap().push(audit.clone());
        Ok(())
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(0)
    }

    async fn recent(
        &self,
        limit: i64,
        instrument: Option<&str>,
        outcome: Option<AuditOutcome>,
    ) -> anyhow::Result<Vec<SignalAudit>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .rev()
            .filter(|a| instrument.map_or(true, |i| a.payload.get("instrument").and_then(|v| v.as_str()) == Some(i)))
            .filter(|a| outcome.map_or(true, |o| a.outcome == o))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryOrderLogRepo {
    pub entries: Mutex<Vec<OrderExecutionLogEntry>>,
}

#[async_trait]
impl OrderExecutionLogRepository for InMemoryOrderLogRepo {
    async fn record(&self, entry: &OrderExecutionLogEntry) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn find_pending_for_position(&self, _position_id: &str) -> anyhow::Result<Vec<OrderExecutionLogEntry>> {
        Ok(Vec::new())
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        Ok(0)
    }
}

#[derive(Default)]
pub struct InMemoryCapitalRepo {
    pub txs: Mutex<Vec<CapitalTransaction>>,
}

#[async_trait]
impl CapitalTransactionRepository for InMemoryCapitalRepo {
    async fn record(&self, tx: &CapitalTransaction) -> anyhow::Result<()> {
        self.txs.lock().unwrap().push(tx.clone());
        Ok(())
    }

    async fn find_since(&self, _start: DateTime<Utc>) -> anyhow::Result<Vec<CapitalTransaction>> {
        Ok(self.txs.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub engine: Arc<Engine>,
    pub position_repo: Arc<InMemoryPositionRepo>,
    pub portfolio_repo: Arc<InMemoryPortfolioRepo>,
    pub pyramiding_repo: Arc<InMemoryPyramidingRepo>,
    pub audit_repo: Arc<InMemoryAuditRepo>,
    pub capital_repo: Arc<InMemoryCapitalRepo>,
}

pub fn build_harness(equity_high: Decimal, fixed_quote: Decimal) -> Harness {
    build_harness_at(equity_high, fixed_quote, session_instant())
}

pub fn build_harness_at(equity_high: Decimal, fixed_quote: Decimal, at: DateTime<Utc>) -> Harness {
    let config = Arc::new(Config::from_env().expect("defaults should always parse"));
    let calendar = Arc::new(MarketCalendar::new(config.market_hours.clone(), Vec::new(), Vec::new()));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(at));
    let broker: Arc<dyn trend_portfolio_engine::domain::ports::BrokerPort> = Arc::new(MockBroker::new(fixed_quote));
    let executor = OrderExecutor::new(broker, config.execution.clone());

    let portfolio_repo = Arc::new(InMemoryPortfolioRepo::default());
    *portfolio_repo.state.lock().unwrap() = Some(PortfolioState::new(equity_high));

    let position_repo = Arc::new(InMemoryPositionRepo::default());
    let pyramiding_repo = Arc::new(InMemoryPyramidingRepo::default());
    let audit_repo = Arc::new(InMemoryAuditRepo::default());
    let order_log_repo = Arc::new(InMemoryOrderLogRepo::default());
    let capital_repo = Arc::new(InMemoryCapitalRepo::default());

    let engine = Engine {
        clock,
        calendar,
        dedup_cache: Arc::new(DedupCache::new()),
        config,
        instruments: Instrument::catalog(),
        portfolio_repo: portfolio_repo.clone(),
        position_repo: position_repo.clone(),
        pyramiding_repo: pyramiding_repo.clone(),
        audit_repo: audit_repo.clone(),
        order_log_repo,
        capital_repo,
        executor,
        notifier: Arc::new(NullNotifier),
        instance_id: "test-instance".to_string(),
        trading_paused: Arc::new(AtomicBool::new(false)),
        is_leader: Arc::new(AtomicBool::new(true)),
    };

    Harness { engine: Arc::new(engine), position_repo, portfolio_repo, pyramiding_repo, audit_repo, capital_repo }
}

pub fn base_entry_signal() -> Signal {
    Signal {
        kind: SignalKind::BaseEntry,
        instrument: InstrumentId::BankNifty,
        layer: Some(Layer::BASE),
        signal_timestamp: session_instant() - chrono::Duration::seconds(5),
        price: dec!(52000),
        stop: dec!(51800),
        suggested_lots: None,
        atr: dec!(350),
        er: None,
        supertrend: None,
        roc: None,
        reason: None,
        raw: serde_json::json!({ "instrument": "BANK_NIFTY", "type": "BASE_ENTRY" }),
    }
}

pub fn open_base_position(entry_price: Decimal, initial_stop: Decimal) -> Position {
    Position {
        position_id: Position::make_id(InstrumentId::BankNifty, Layer::BASE),
        instrument: InstrumentId::BankNifty,
        layer: Layer::BASE,
        status: PositionStatus::Open,
        entry_timestamp: session_instant(),
        entry_price,
        lots: dec!(4),
        quantity: dec!(60),
        initial_stop,
        current_stop: initial_stop,
        highest_close: entry_price,
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        atr_at_entry: dec!(350),
        limiter: LimiterTag::Risk,
        is_base_position: true,
        rollover_status: RolloverStatus::None,
        rollover_count: 0,
        legs: ExecutionLegs::Synthetic {
            sell_pe_symbol: "BANKNIFTY26081751900PE".to_string(),
            buy_ce_symbol: "BANKNIFTY26081752100CE".to_string(),
            pe_fill_price: dec!(300),
            ce_fill_price: dec!(300),
            pe_broker_order_id: "mock-1".to_string(),
            ce_broker_order_id: "mock-2".to_string(),
        },
        strategy_id: "trend-following-v1".to_string(),
        exit_timestamp: None,
        exit_price: None,
        exit_reason: None,
        version: 0,
    }
}

/// A single-leg futures position (Gold Mini), for rollover scenarios.
pub fn open_gold_futures_position(contract_month: &str, entry_price: Decimal, initial_stop: Decimal) -> Position {
    Position {
        position_id: Position::make_id(InstrumentId::GoldMini, Layer::BASE),
        instrument: InstrumentId::GoldMini,
        layer: Layer::BASE,
        status: PositionStatus::Open,
        entry_timestamp: session_instant(),
        entry_price,
        lots: dec!(3),
        quantity: dec!(30),
        initial_stop,
        current_stop: initial_stop,
        highest_close: entry_price,
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        atr_at_entry: dec!(120),
        limiter: LimiterTag::Risk,
        is_base_position: true,
        rollover_status: RolloverStatus::None,
        rollover_count: 0,
        legs: ExecutionLegs::Futures {
            symbol: format!("GOLDM{contract_month}FUT"),
            contract_month: contract_month.to_string(),
            broker_order_id: "mock-gold-1".to_string(),
        },
        strategy_id: "trend-following-v1".to_string(),
        exit_timestamp: None,
        exit_price: None,
        exit_reason: None,
        version: 0,
    }
}

/// A single-leg futures position (Silver Mini), for the fixed-month-cycle
/// rollover scenario: unlike Gold Mini's `EveryMonth` rule, Silver Mini only
/// trades Feb/Apr/Jun/Aug/Nov.
pub fn open_silver_futures_position(contract_month: &str, entry_price: Decimal, initial_stop: Decimal) -> Position {
    Position {
        position_id: Position::make_id(InstrumentId::SilverMini, Layer::BASE),
        instrument: InstrumentId::SilverMini,
        layer: Layer::BASE,
        status: PositionStatus::Open,
        entry_timestamp: session_instant(),
        entry_price,
        lots: dec!(3),
        quantity: dec!(15),
        initial_stop,
        current_stop: initial_stop,
        highest_close: entry_price,
        unrealized_pnl: Decimal::ZERO,
        realized_pnl: Decimal::ZERO,
        atr_at_entry: dec!(80),
        limiter: LimiterTag::Risk,
        is_base_position: true,
        rollover_status: RolloverStatus::None,
        rollover_count: 0,
        legs: ExecutionLegs::Futures {
            symbol: format!("SILVERM{contract_month}FUT"),
            contract_month: contract_month.to_string(),
            broker_order_id: "mock-silver-1".to_string(),
        },
        strategy_id: "trend-following-v1".to_string(),
        exit_timestamp: None,
        exit_price: None,
        exit_reason: None,
        version: 0,
    }
}
