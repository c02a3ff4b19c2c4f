//! Engine (Orchestrator): the single entry point `process_signal` (§4.7).
//!
//! Wires intake → validator → sizer → pyramid gate → stop manager →
//! executor → state store + audit → notifier, exactly in the order §4.7
//! lists. Every exit path writes one `SignalAudit` row before returning.

use crate::application::executor::{ExecutionOutcome, LegRequest, OrderExecutor};
use crate::application::intake::{self, DedupCache};
use crate::application::pyramid_gate::PyramidGate;
use crate::application::sizing::PositionSizer;
use crate::application::stop_manager::StopManager;
use crate::application::validator::SignalValidator;
use crate::config::Config;
use crate::domain::audit::{AuditBuilder, AuditOutcome, OrderExecutionStatus};
use crate::domain::capital::CapitalTransaction;
use crate::domain::errors::{RiskError, ValidationError};
use crate::domain::instrument::{Instrument, InstrumentId};
use crate::domain::ports::{Clock, NotificationSeverity, Notification, NotifierPort, OrderAction};
use crate::domain::position::{ExecutionLegs, LimiterTag, Position, PositionStatus, RolloverStatus};
use crate::domain::pyramiding::PyramidingState;
use crate::domain::repositories::{
    CapitalTransactionRepository, OrderExecutionLogRepository, PortfolioRepository, PositionRepository,
    PyramidingRepository, SignalAuditRepository,
};
use crate::domain::signal::{Layer, Signal, SignalKind};
use crate::infrastructure::calendar::MarketCalendar;
use crate::infrastructure::symbol_resolver::SymbolResolver;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Result handed back to the caller of `process_signal`; mirrors the audit
/// row's `outcome`/`reason` without re-exposing internal error types.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Outcome {
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
    pub position_id: Option<String>,
}

pub struct Engine {
    pub clock: Arc<dyn Clock>,
    pub calendar: Arc<MarketCalendar>,
    pub dedup_cache: Arc<DedupCache>,
    pub config: Arc<Config>,
    pub instruments: HashMap<InstrumentId, Instrument>,
    pub portfolio_repo: Arc<dyn PortfolioRepository>,
    pub position_repo: Arc<dyn PositionRepository>,
    pub pyramiding_repo: Arc<dyn PyramidingRepository>,
    pub audit_repo: Arc<dyn SignalAuditRepository>,
    pub order_log_repo: Arc<dyn OrderExecutionLogRepository>,
    pub capital_repo: Arc<dyn CapitalTransactionRepository>,
    pub executor: OrderExecutor,
    pub notifier: Arc<dyn NotifierPort>,
    pub instance_id: String,
    pub trading_paused: Arc<AtomicBool>,
    pub is_leader: Arc<AtomicBool>,
}

const OPTIMISTIC_LOCK_RETRIES: u32 = 3;

impl Engine {
    pub async fn process_signal(&self, signal: Signal) -> anyhow::Result<Outcome> {
        let started_at = self.clock.now();
        let fingerprint = signal.fingerprint();

        // 1. Emergency pause.
        if self.trading_paused.load(Ordering::SeqCst) {
            return self
                .finish(
                    &signal,
                    started_at,
                    AuditOutcome::RejectedManual,
                    Some("trading paused".to_string()),
                    None,
                    None,
                )
                .await;
        }

        let instrument = match self.instruments.get(&signal.instrument) {
            Some(i) => i.clone(),
            None => {
                return self
                    .finish(&signal, started_at, AuditOutcome::RejectedValidation, Some("unknown instrument".into()), None, None)
                    .await;
            }
        };

        // 2. Market hours / holiday calendar.
        if !self.calendar.is_open(SymbolResolver::exchange(instrument.id), started_at) {
            return self
                .finish(&signal, started_at, AuditOutcome::RejectedMarket, Some("market closed".to_string()), None, None)
                .await;
        }

        // 3. Dedup.
        if intake::is_duplicate(&self.dedup_cache, self.audit_repo.as_ref(), &signal).await? {
            return self
                .finish(&signal, started_at, AuditOutcome::RejectedDuplicate, Some(format!("duplicate fingerprint {fingerprint}")), None, None)
                .await;
        }

        // 4. Validate.
        if let Err(err) = SignalValidator::check_freshness(&signal, started_at, &self.config.eod) {
            return self
                .finish(&signal, started_at, AuditOutcome::RejectedValidation, Some(err.to_string()), Some(err.code()), None)
                .await;
        }

        if self.config.execution.signal_validation_enabled {
            let symbol = self.quote_symbol_for_signal(&instrument, &signal);
            match self.executor.quote(&symbol).await {
                Ok(quote) => {
                    if let Err(err) = SignalValidator::check_divergence(&signal, quote.last_price) {
                        return self
                            .finish(&signal, started_at, AuditOutcome::RejectedValidation, Some(err.to_string()), Some(err.code()), None)
                            .await;
                    }
                }
                Err(err) => {
                    warn!(fingerprint = %fingerprint, error = %err, "divergence quote fetch failed, proceeding without validation");
                }
            }
        }

        if !self.is_leader.load(Ordering::SeqCst) {
            // Non-leaders persist audit for visibility but never mutate state (§4.8).
            return self
                .finish(&signal, started_at, AuditOutcome::RejectedManual, Some("not leader".to_string()), None, None)
                .await;
        }

        // 5. Dispatch by kind.
        let result = match signal.kind {
            SignalKind::BaseEntry => self.handle_base_entry(&signal, &instrument).await,
            SignalKind::Pyramid => self.handle_pyramid(&signal, &instrument).await,
            SignalKind::Exit => self.handle_exit(&signal, &instrument).await,
            SignalKind::EodMonitor => {
                Ok((AuditOutcome::Processed, Some("eod monitor tick".to_string()), None))
            }
        };

        let (outcome, reason, position_id) = match result {
            Ok(triple) => triple,
            Err(err) => (AuditOutcome::FailedOrder, Some(err.to_string()), None),
        };

        self.finish(&signal, started_at, outcome, reason, None, position_id).await
    }

    async fn handle_base_entry(
        &self,
        signal: &Signal,
        instrument: &Instrument,
    ) -> anyhow::Result<(AuditOutcome, Option<String>, Option<String>)> {
        if self
            .position_repo
            .find_open(instrument.id, Layer::BASE.label().as_str())
            .await?
            .is_some()
        {
            return Ok((AuditOutcome::RejectedValidation, Some(ValidationError::MissingBase { instrument: instrument.id.as_str().to_string() }.to_string()), None));
        }

        let portfolio = self.portfolio_repo.load().await?;
        if let Err(err) = PyramidGate::check_hard_cap(&portfolio, &self.config.portfolio) {
            return Ok((AuditOutcome::RejectedRisk, Some(err.to_string()), None));
        }

        let marked = self.mark_all_open_to_market().await?;
        let open_unrealized: Decimal = marked.iter().map(|p| p.unrealized_pnl).sum();

        let sizing = PositionSizer::size(instrument, &portfolio, &self.config.portfolio, signal, Layer::BASE, open_unrealized);
        if sizing.is_zero_lot() {
            return Ok((AuditOutcome::Processed, Some("zero-lot: no order placed".to_string()), None));
        }

        self.execute_entry(signal, instrument, Layer::BASE, sizing.final_lots, true, &portfolio).await
    }

    async fn handle_pyramid(
        &self,
        signal: &Signal,
        instrument: &Instrument,
    ) -> anyhow::Result<(AuditOutcome, Option<String>, Option<String>)> {
        let base = self.position_repo.find_open(instrument.id, Layer::BASE.label().as_str()).await?;
        let Some(base) = base else {
            return Ok((AuditOutcome::RejectedValidation, Some(ValidationError::MissingBase { instrument: instrument.id.as_str().to_string() }.to_string()), None));
        };

        if self.config.portfolio.use_1r_gate {
            if let Err(err) = SignalValidator::check_1r_gate(signal, &base) {
                return Ok((AuditOutcome::RejectedValidation, Some(err.to_string()), None));
            }
        }

        let open_positions = self.open_positions_for(instrument.id).await?;
        let next_layer = Layer((open_positions.len() as u8) + 1);
        if next_layer.0 > 6 {
            return Ok((AuditOutcome::RejectedRisk, Some(RiskError::MaxPyramidsReached { instrument: instrument.id.as_str().to_string(), max_pyramids: instrument.max_pyramids }.to_string()), None));
        }

        let pyramiding = self.pyramiding_repo.find(instrument.id).await?;
        let portfolio = self.portfolio_repo.load().await?;

        if let Err(err) = PyramidGate::check_hard_cap(&portfolio, &self.config.portfolio) {
            return Ok((AuditOutcome::RejectedRisk, Some(err.to_string()), None));
        }
        if let Err(err) = PyramidGate::check_instrument_gate(
            instrument,
            open_positions.len() as u32,
            pyramiding.as_ref(),
            signal,
            &self.config.portfolio,
        ) {
            return Ok((AuditOutcome::RejectedRisk, Some(err.to_string()), None));
        }
        if let Err(err) = PyramidGate::check_portfolio_gate(&portfolio, &self.config.portfolio) {
            return Ok((AuditOutcome::RejectedRisk, Some(err.to_string()), None));
        }

        let base_risk = (base.entry_price - base.initial_stop) * instrument.point_value * base.lots;
        let marked = self.mark_all_open_to_market().await?;
        let combined_unrealized: Decimal = marked.iter().map(|p| p.unrealized_pnl).sum();
        let instrument_unrealized: Decimal =
            marked.iter().filter(|p| p.instrument == instrument.id).map(|p| p.unrealized_pnl).sum();
        if let Err(err) = PyramidGate::check_profit_gate(combined_unrealized, instrument_unrealized, base_risk) {
            return Ok((AuditOutcome::RejectedRisk, Some(err.to_string()), None));
        }

        let sizing = PositionSizer::size(instrument, &portfolio, &self.config.portfolio, signal, next_layer, combined_unrealized);
        if sizing.is_zero_lot() {
            return Ok((AuditOutcome::Processed, Some("zero-lot: no order placed".to_string()), None));
        }

        let (outcome, reason, position_id) =
            self.execute_entry(signal, instrument, next_layer, sizing.final_lots, false, &portfolio).await?;

        if outcome == AuditOutcome::Processed {
            let mut state = pyramiding.unwrap_or_else(|| {
                PyramidingState::new(instrument.id, base.position_id.clone(), signal.price)
            });
            state.record_pyramid(signal.price, self.clock.now());
            self.pyramiding_repo.upsert(&state).await?;
        }

        Ok((outcome, reason, position_id))
    }

    async fn handle_exit(
        &self,
        signal: &Signal,
        instrument: &Instrument,
    ) -> anyhow::Result<(AuditOutcome, Option<String>, Option<String>)> {
        let targets = match signal.layer {
            Some(layer) => self
                .position_repo
                .find_open(instrument.id, layer.label().as_str())
                .await?
                .into_iter()
                .collect::<Vec<_>>(),
            None => self.open_positions_for(instrument.id).await?,
        };

        if targets.is_empty() {
            return Ok((AuditOutcome::RejectedValidation, Some("no open position to exit".to_string()), None));
        }

        let reason = signal.reason.clone().unwrap_or_else(|| "EXIT".to_string());
        let mut last_position_id = None;
        for mut position in targets {
            position.status = PositionStatus::Closing;
            self.position_repo.save(&position, position.version).await?;

            let legs = self.exit_legs(&position, signal.price);
            let exec = self.executor.execute(&legs).await;
            let (status, fill_price, results) = match exec {
                ExecutionOutcome::Filled(results) => (
                    OrderExecutionStatus::Filled,
                    results.iter().map(|r| r.fill_price).sum::<Decimal>() / Decimal::from(results.len().max(1)),
                    results,
                ),
                ExecutionOutcome::PartialFill(results) => (
                    OrderExecutionStatus::PartialFill,
                    results.iter().map(|r| r.fill_price).sum::<Decimal>() / Decimal::from(results.len().max(1)),
                    results,
                ),
                ExecutionOutcome::Failed { reason, .. } => {
                    return Ok((AuditOutcome::FailedOrder, Some(reason), Some(position.position_id)));
                }
            };

            for (request, result) in legs.iter().zip(results.iter()) {
                let entry = result.to_log_entry(&position.position_id, request.action, self.clock.now(), 0, signal.price);
                self.order_log_repo.record(&entry).await?;
            }

            let realized = (fill_price - position.entry_price) * instrument.point_value * position.lots;
            position.status = PositionStatus::Closed;
            position.exit_timestamp = Some(self.clock.now());
            position.exit_price = Some(fill_price);
            position.exit_reason = Some(reason.clone());
            position.realized_pnl = realized;
            self.position_repo.save(&position, position.version).await?;

            self.apply_realized_pnl(&position.position_id, realized).await?;

            if status == OrderExecutionStatus::PartialFill {
                warn!(position_id = %position.position_id, "exit partially filled, reconciliation required");
            }

            if position.is_base_position {
                self.pyramiding_repo.clear(instrument.id).await?;
            }

            last_position_id = Some(position.position_id);
        }

        self.recompute_portfolio_exposure().await?;
        Ok((AuditOutcome::Processed, Some(reason), last_position_id))
    }

    async fn execute_entry(
        &self,
        signal: &Signal,
        instrument: &Instrument,
        layer: Layer,
        lots: i64,
        is_base: bool,
        portfolio: &crate::domain::portfolio::PortfolioState,
    ) -> anyhow::Result<(AuditOutcome, Option<String>, Option<String>)> {
        let quantity = Decimal::from(lots) * instrument.lot_size;
        let legs = self.entry_legs(instrument, signal, quantity);

        let exec = self.executor.execute(&legs).await;
        let (legs_out, status) = match exec {
            ExecutionOutcome::Filled(l) => (l, OrderExecutionStatus::Filled),
            ExecutionOutcome::PartialFill(l) => (l, OrderExecutionStatus::PartialFill),
            ExecutionOutcome::Failed { reason, .. } => {
                return Ok((AuditOutcome::FailedOrder, Some(reason), None));
            }
        };

        let position_id = Position::make_id(instrument.id, layer);
        let current_stop = StopManager::initial_stop(instrument, signal.price, signal.atr);
        let execution_legs = self.build_execution_legs(instrument, &legs_out);

        for (request, result) in legs.iter().zip(legs_out.iter()) {
            let entry = result.to_log_entry(&position_id, request.action, self.clock.now(), 0, signal.price);
            self.order_log_repo.record(&entry).await?;
        }

        let position = Position {
            position_id: position_id.clone(),
            instrument: instrument.id,
            layer,
            status: if status == OrderExecutionStatus::PartialFill { PositionStatus::Partial } else { PositionStatus::Open },
            entry_timestamp: self.clock.now(),
            entry_price: signal.price,
            lots: Decimal::from(lots),
            quantity,
            initial_stop: current_stop,
            current_stop,
            highest_close: signal.price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            atr_at_entry: signal.atr,
            limiter: match status {
                OrderExecutionStatus::PartialFill => LimiterTag::Floor,
                _ => LimiterTag::Risk,
            },
            is_base_position: is_base,
            rollover_status: RolloverStatus::None,
            rollover_count: 0,
            legs: execution_legs,
            strategy_id: "trend-following-v1".to_string(),
            exit_timestamp: None,
            exit_price: None,
            exit_reason: None,
            version: 0,
        };

        self.position_repo.insert(&position).await?;

        let margin_used = portfolio.margin_used + instrument.margin_per_lot * Decimal::from(lots);
        let mut updated = portfolio.clone();
        updated.margin_used = margin_used;
        let open_positions = self.position_repo.find_all_open().await?;
        updated.recompute_exposure(&open_positions, &self.instruments);
        self.save_portfolio_with_retry(updated).await?;

        if is_base {
            let state = PyramidingState::new(instrument.id, position_id.clone(), signal.price);
            self.pyramiding_repo.upsert(&state).await?;
        }

        self.notifier
            .notify(Notification {
                severity: NotificationSeverity::Info,
                title: "position opened".to_string(),
                body: format!("{position_id}: {lots} lots @ {}", signal.price),
                instrument: Some(instrument.id),
            })
            .await
            .ok();

        let outcome = if status == OrderExecutionStatus::PartialFill { AuditOutcome::PartialFill } else { AuditOutcome::Processed };
        Ok((outcome, None, Some(position_id)))
    }

    /// Checks every open position's stop against live price; called by the
    /// scheduler (EOD monitor) and available for ad-hoc polling.
    pub fn check_stop_breach(&self, position: &Position, live_price: Decimal) -> Option<crate::application::stop_manager::StopBreach> {
        StopManager::check_breach(position, live_price)
    }

    /// `POST /emergency/close-all` (§6): exits every open position through
    /// the ordinary EXIT path, one synthetic signal per open position, so
    /// the usual audit trail and P&L booking applies. `dry_run` only
    /// reports what would be closed.
    pub async fn emergency_close_all(&self, dry_run: bool) -> anyhow::Result<Vec<String>> {
        let open = self.position_repo.find_all_open().await?;
        let position_ids: Vec<String> = open.iter().map(|p| p.position_id.clone()).collect();
        if dry_run {
            return Ok(position_ids);
        }

        let now = self.clock.now();
        for position in &open {
            let signal = Signal {
                kind: SignalKind::Exit,
                instrument: position.instrument,
                layer: Some(position.layer),
                signal_timestamp: now,
                price: position.current_stop,
                stop: position.current_stop,
                suggested_lots: None,
                atr: position.atr_at_entry,
                er: None,
                supertrend: None,
                roc: None,
                reason: Some("EMERGENCY_CLOSE_ALL".to_string()),
                raw: serde_json::json!({ "source": "emergency_close_all" }),
            };
            if let Err(err) = self.process_signal(signal).await {
                warn!(position_id = %position.position_id, error = %err, "emergency close-all failed for position");
            }
        }
        Ok(position_ids)
    }

    fn entry_legs(&self, instrument: &Instrument, signal: &Signal, quantity: Decimal) -> Vec<LegRequest> {
        if instrument.is_synthetic() {
            let expiry = Utc::now().date_naive();
            let strike = (signal.price / instrument.strike_interval).round() * instrument.strike_interval;
            let sell_pe = SymbolResolver::option_symbol(expiry, strike, false);
            let buy_ce = SymbolResolver::option_symbol(expiry, strike, true);
            vec![
                LegRequest { symbol: sell_pe, action: OrderAction::Sell, quantity, signal_price: signal.price },
                LegRequest { symbol: buy_ce, action: OrderAction::Buy, quantity, signal_price: signal.price },
            ]
        } else {
            let month = Utc::now().date_naive();
            let symbol = SymbolResolver::futures_symbol(instrument.id, month);
            vec![LegRequest { symbol, action: OrderAction::Buy, quantity, signal_price: signal.price }]
        }
    }

    fn exit_legs(&self, position: &Position, live_price: Decimal) -> Vec<LegRequest> {
        match &position.legs {
            ExecutionLegs::Synthetic { sell_pe_symbol, buy_ce_symbol, .. } => vec![
                LegRequest { symbol: buy_ce_symbol.clone(), action: OrderAction::Sell, quantity: position.quantity, signal_price: live_price },
                LegRequest { symbol: sell_pe_symbol.clone(), action: OrderAction::Buy, quantity: position.quantity, signal_price: live_price },
            ],
            ExecutionLegs::Futures { symbol, .. } => vec![LegRequest {
                symbol: symbol.clone(),
                action: OrderAction::Sell,
                quantity: position.quantity,
                signal_price: live_price,
            }],
        }
    }

    fn build_execution_legs(&self, instrument: &Instrument, legs: &[crate::application::executor::LegResult]) -> ExecutionLegs {
        if instrument.is_synthetic() && legs.len() == 2 {
            ExecutionLegs::Synthetic {
                sell_pe_symbol: legs[0].symbol.clone(),
                buy_ce_symbol: legs[1].symbol.clone(),
                pe_fill_price: legs[0].fill_price,
                ce_fill_price: legs[1].fill_price,
                pe_broker_order_id: legs[0].broker_order_id.clone(),
                ce_broker_order_id: legs[1].broker_order_id.clone(),
            }
        } else {
            let leg = &legs[0];
            ExecutionLegs::Futures {
                symbol: leg.symbol.clone(),
                contract_month: Utc::now().format("%Y-%m").to_string(),
                broker_order_id: leg.broker_order_id.clone(),
            }
        }
    }

    async fn open_positions_for(&self, instrument: InstrumentId) -> anyhow::Result<Vec<Position>> {
        Ok(self
            .position_repo
            .find_all_open()
            .await?
            .into_iter()
            .filter(|p| p.instrument == instrument)
            .collect())
    }

    /// Resolves the symbol used for a pre-trade divergence quote: the
    /// position's own leg symbol isn't known yet at BASE_ENTRY, so this
    /// mirrors `entry_legs`'s synthesis rather than reading a stored leg.
    fn quote_symbol_for_signal(&self, instrument: &Instrument, signal: &Signal) -> String {
        if instrument.is_synthetic() {
            let expiry = Utc::now().date_naive();
            let strike = (signal.price / instrument.strike_interval).round() * instrument.strike_interval;
            SymbolResolver::option_symbol(expiry, strike, true)
        } else {
            let month = Utc::now().date_naive();
            SymbolResolver::futures_symbol(instrument.id, month)
        }
    }

    /// Marks one open position to market, mirroring the EOD monitor's own
    /// quote-fetch-by-leg-symbol pattern.
    async fn mark_to_market(&self, position: &Position, instrument: &Instrument) -> anyhow::Result<Decimal> {
        let symbol = match &position.legs {
            ExecutionLegs::Futures { symbol, .. } => symbol.clone(),
            ExecutionLegs::Synthetic { buy_ce_symbol, .. } => buy_ce_symbol.clone(),
        };
        let quote = self.executor.quote(&symbol).await?;
        Ok((quote.last_price - position.entry_price) * instrument.point_value * position.lots)
    }

    /// Refreshes `unrealized_pnl` across every open position against a live
    /// quote, persisting any change, before the pyramid profit gate (§4.4)
    /// or an `open`/`blended` equity-mode sizing basis (§4.3) reads it. A
    /// failed quote fetch leaves that position's last known P&L in place
    /// rather than blocking the signal.
    async fn mark_all_open_to_market(&self) -> anyhow::Result<Vec<Position>> {
        let mut positions = self.position_repo.find_all_open().await?;
        for position in positions.iter_mut() {
            let Some(instrument) = self.instruments.get(&position.instrument) else { continue };
            match self.mark_to_market(position, instrument).await {
                Ok(marked) if marked != position.unrealized_pnl => {
                    position.unrealized_pnl = marked;
                    self.position_repo.save(position, position.version).await?;
                    position.version += 1;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(position_id = %position.position_id, error = %err, "mark-to-market quote fetch failed");
                }
            }
        }
        Ok(positions)
    }

    /// Recomputes `PortfolioState`'s risk/vol exposure totals from every
    /// currently open position, so `PyramidGate::check_hard_cap` and
    /// `check_portfolio_gate` (§4.4) see live numbers rather than the zeros
    /// a freshly-loaded row starts with.
    pub(crate) async fn recompute_portfolio_exposure(&self) -> anyhow::Result<()> {
        let open_positions = self.position_repo.find_all_open().await?;
        let portfolio = self.portfolio_repo.load().await?;
        let mut updated = portfolio.clone();
        updated.recompute_exposure(&open_positions, &self.instruments);
        self.save_portfolio_with_retry(updated).await
    }

    async fn apply_realized_pnl(&self, position_id: &str, realized: Decimal) -> anyhow::Result<()> {
        let portfolio = self.portfolio_repo.load().await?;
        let equity_before = portfolio.closed_equity;
        let mut updated = portfolio.clone();
        updated.apply_realized_pnl(realized);
        self.save_portfolio_with_retry(updated).await?;

        let tx = CapitalTransaction::trading_pnl(position_id.to_string(), realized, equity_before);
        self.capital_repo.record(&tx).await
    }

    /// §4.7: "all state changes use optimistic locking ... on conflict,
    /// retry up to N times; on exhaustion, surface as a FAILED_ORDER".
    async fn save_portfolio_with_retry(&self, mut state: crate::domain::portfolio::PortfolioState) -> anyhow::Result<()> {
        let mut attempt = 0;
        loop {
            let expected = state.version;
            match self.portfolio_repo.save(&state, expected).await {
                Ok(()) => return Ok(()),
                Err(err) if attempt < OPTIMISTIC_LOCK_RETRIES => {
                    attempt += 1;
                    warn!(attempt, error = %err, "portfolio state conflict, retrying");
                    state = self.portfolio_repo.load().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn finish(
        &self,
        signal: &Signal,
        started_at: chrono::DateTime<Utc>,
        outcome: AuditOutcome,
        reason: Option<String>,
        rejection_code: Option<&'static str>,
        position_id: Option<String>,
    ) -> anyhow::Result<Outcome> {
        let duration_ms = (self.clock.now() - started_at).num_milliseconds();
        let audit = AuditBuilder {
            outcome: Some(outcome),
            reason: reason.clone(),
            rejection_code: rejection_code.map(str::to_string),
            ..Default::default()
        }
        .build(signal.fingerprint(), signal.raw.clone(), duration_ms, self.instance_id.clone());
        // A persistence hiccup here must not turn an already-executed trade
        // into a reported failure; log and move on rather than propagate.
        if let Err(err) = self.audit_repo.record(&audit).await {
            warn!(fingerprint = %signal.fingerprint(), error = %err, "failed to record signal audit");
        }

        if matches!(outcome, AuditOutcome::FailedOrder) {
            self.notifier
                .notify(Notification {
                    severity: NotificationSeverity::Critical,
                    title: "order execution failed".to_string(),
                    body: reason.clone().unwrap_or_default(),
                    instrument: Some(signal.instrument),
                })
                .await
                .ok();
        }

        info!(fingerprint = %signal.fingerprint(), outcome = ?outcome, duration_ms, "signal processed");
        Ok(Outcome { outcome, reason, position_id })
    }
}
