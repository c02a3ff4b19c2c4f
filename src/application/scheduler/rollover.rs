//! Rollover scanner and executor (§4.9): close an about-to-expire contract
//! and re-open the equivalent exposure on the next contract month, while
//! preserving lots and layer lineage.

use crate::application::engine::Engine;
use crate::application::executor::LegRequest;
use crate::config::RolloverEnvConfig;
use crate::domain::audit::OrderExecutionStatus;
use crate::domain::capital::CapitalTransaction;
use crate::domain::instrument::{ContractMonthRule, Instrument};
use crate::domain::position::{ExecutionLegs, Position, PositionStatus, RolloverStatus};
use crate::domain::ports::OrderAction;
use crate::infrastructure::symbol_resolver::SymbolResolver;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub struct RolloverScanner {
    engine: Arc<Engine>,
    config: RolloverEnvConfig,
}

impl RolloverScanner {
    pub fn new(engine: Arc<Engine>, config: RolloverEnvConfig) -> Self {
        Self { engine, config }
    }

    /// Marks every open position within its instrument's rollover lookahead
    /// window as `pending` and returns the ones ready for the executor.
    pub async fn scan(&self) -> anyhow::Result<Vec<Position>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let now = self.engine.clock.now().date_naive();
        let mut due = Vec::new();
        for mut position in self.engine.position_repo.find_all_open().await? {
            if position.rollover_status != RolloverStatus::None {
                continue;
            }
            let Some(instrument) = self.engine.instruments.get(&position.instrument) else { continue };
            let Some(expiry) = current_expiry(&position) else { continue };
            let days_to_expiry = (expiry - now).num_days();
            if days_to_expiry <= instrument.rollover_lookahead_days {
                position.rollover_status = RolloverStatus::Pending;
                self.engine.position_repo.save(&position, position.version).await?;
                info!(position_id = %position.position_id, days_to_expiry, "rollover scheduled");
                due.push(position);
            }
        }
        Ok(due)
    }
}

pub struct RolloverExecutor {
    engine: Arc<Engine>,
    config: RolloverEnvConfig,
}

impl RolloverExecutor {
    pub fn new(engine: Arc<Engine>, config: RolloverEnvConfig) -> Self {
        Self { engine, config }
    }

    /// §4.9: "(a) closes the old contract (EXIT with reason ROLLOVER), (b)
    /// immediately re-enters the equivalent notional on the next contract
    /// month with the same lots (bypassing sizing), (c) updates position
    /// lineage". Bounded retries per `RolloverEnvConfig::max_retries`.
    pub async fn execute(&self, mut position: Position) -> anyhow::Result<()> {
        position.rollover_status = RolloverStatus::InProgress;
        self.engine.position_repo.save(&position, position.version).await?;
        position.version += 1;

        let mut attempt = 0;
        loop {
            match self.roll_once(&position).await {
                Ok(()) => {
                    self.engine.recompute_portfolio_exposure().await?;
                    return Ok(());
                }
                Err(err) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(position_id = %position.position_id, attempt, error = %err, "rollover attempt failed, retrying");
                    sleep(std::time::Duration::from_secs(self.config.retry_interval_sec)).await;
                }
                Err(err) => {
                    error!(position_id = %position.position_id, error = %err, "rollover exhausted retries");
                    position.rollover_status = RolloverStatus::Failed;
                    self.engine.position_repo.save(&position, position.version).await?;
                    return Err(err);
                }
            }
        }
    }

    async fn roll_once(&self, position: &Position) -> anyhow::Result<()> {
        let instrument = self
            .engine
            .instruments
            .get(&position.instrument)
            .ok_or_else(|| anyhow::anyhow!("unknown instrument for rollover"))?;

        let (exit_price, version_after_exit) = self.exit_old_contract(position, instrument).await?;
        self.reenter_next_contract(position, instrument, exit_price, version_after_exit).await
    }

    /// Closes the expiring leg and returns its fill price plus the position's
    /// version after that close, so the caller can re-enter against the same
    /// row (`position_id` is stable across rollover, keyed by
    /// instrument+layer) without racing its own optimistic lock.
    async fn exit_old_contract(
        &self,
        position: &Position,
        instrument: &Instrument,
    ) -> anyhow::Result<(rust_decimal::Decimal, i64)> {
        let legs = exit_legs(position);
        let outcome = self.engine.executor.execute(&legs).await;
        let fill_price = match outcome {
            crate::application::executor::ExecutionOutcome::Filled(results)
            | crate::application::executor::ExecutionOutcome::PartialFill(results) => {
                results.iter().map(|r| r.fill_price).sum::<rust_decimal::Decimal>()
                    / rust_decimal::Decimal::from(results.len().max(1))
            }
            crate::application::executor::ExecutionOutcome::Failed { reason, .. } => {
                return Err(anyhow::anyhow!("rollover exit leg failed: {reason}"));
            }
        };

        let realized = (fill_price - position.entry_price) * instrument.point_value * position.lots;
        let portfolio = self.engine.portfolio_repo.load().await?;
        let equity_before = portfolio.closed_equity;
        let mut updated = portfolio.clone();
        updated.apply_realized_pnl(realized);
        self.engine.portfolio_repo.save(&updated, portfolio.version).await?;

        let mut closed = position.clone();
        closed.status = PositionStatus::Closed;
        closed.exit_timestamp = Some(self.engine.clock.now());
        closed.exit_price = Some(fill_price);
        closed.exit_reason = Some("ROLLOVER".to_string());
        closed.realized_pnl = realized;
        self.engine.position_repo.save(&closed, position.version).await?;

        let tx = CapitalTransaction::trading_pnl(position.position_id.clone(), realized, equity_before);
        self.engine.capital_repo.record(&tx).await?;
        Ok((fill_price, position.version + 1))
    }

    async fn reenter_next_contract(
        &self,
        position: &Position,
        instrument: &Instrument,
        reference_price: rust_decimal::Decimal,
        expected_version: i64,
    ) -> anyhow::Result<()> {
        let current_month = current_contract_month(position).unwrap_or_else(|| self.engine.clock.now().date_naive());
        let next_month = next_contract_month(current_month, instrument.contract_month_rule);
        let legs = entry_legs_for_rollover(position, instrument, next_month, reference_price);

        let outcome = self.engine.executor.execute(&legs).await;
        let (legs_out, status) = match outcome {
            crate::application::executor::ExecutionOutcome::Filled(l) => (l, OrderExecutionStatus::Filled),
            crate::application::executor::ExecutionOutcome::PartialFill(l) => (l, OrderExecutionStatus::PartialFill),
            crate::application::executor::ExecutionOutcome::Failed { reason, .. } => {
                return Err(anyhow::anyhow!("rollover re-entry failed: {reason}"));
            }
        };

        let new_legs = if instrument.is_synthetic() && legs_out.len() == 2 {
            ExecutionLegs::Synthetic {
                sell_pe_symbol: legs_out[0].symbol.clone(),
                buy_ce_symbol: legs_out[1].symbol.clone(),
                pe_fill_price: legs_out[0].fill_price,
                ce_fill_price: legs_out[1].fill_price,
                pe_broker_order_id: legs_out[0].broker_order_id.clone(),
                ce_broker_order_id: legs_out[1].broker_order_id.clone(),
            }
        } else {
            ExecutionLegs::Futures {
                symbol: legs_out[0].symbol.clone(),
                contract_month: next_month.format("%Y-%m").to_string(),
                broker_order_id: legs_out[0].broker_order_id.clone(),
            }
        };

        let mut rolled = position.clone();
        rolled.status = if status == OrderExecutionStatus::PartialFill {
            PositionStatus::Partial
        } else {
            PositionStatus::Open
        };
        rolled.entry_price = legs_out.iter().map(|l| l.fill_price).sum::<rust_decimal::Decimal>()
            / rust_decimal::Decimal::from(legs_out.len().max(1));
        rolled.current_stop = crate::application::stop_manager::StopManager::initial_stop(
            instrument,
            rolled.entry_price,
            position.atr_at_entry,
        );
        rolled.initial_stop = rolled.current_stop;
        rolled.highest_close = rolled.entry_price;
        rolled.legs = new_legs;
        rolled.rollover_status = RolloverStatus::Rolled;
        rolled.rollover_count += 1;
        rolled.exit_timestamp = None;
        rolled.exit_price = None;
        rolled.exit_reason = None;

        // `position_id` is deterministic per instrument+layer (`Position::make_id`),
        // so the row already exists under the just-closed contract; re-entry is an
        // update against that same row, not a fresh insert.
        self.engine.position_repo.save(&rolled, expected_version).await
    }
}

fn exit_legs(position: &Position) -> Vec<LegRequest> {
    match &position.legs {
        ExecutionLegs::Synthetic { sell_pe_symbol, buy_ce_symbol, .. } => vec![
            LegRequest { symbol: buy_ce_symbol.clone(), action: OrderAction::Sell, quantity: position.quantity, signal_price: position.entry_price },
            LegRequest { symbol: sell_pe_symbol.clone(), action: OrderAction::Buy, quantity: position.quantity, signal_price: position.entry_price },
        ],
        ExecutionLegs::Futures { symbol, .. } => vec![LegRequest {
            symbol: symbol.clone(),
            action: OrderAction::Sell,
            quantity: position.quantity,
            signal_price: position.entry_price,
        }],
    }
}

fn entry_legs_for_rollover(
    position: &Position,
    instrument: &Instrument,
    next_month: NaiveDate,
    reference_price: rust_decimal::Decimal,
) -> Vec<LegRequest> {
    if instrument.is_synthetic() {
        let strike = (reference_price / instrument.strike_interval).round() * instrument.strike_interval;
        let sell_pe = SymbolResolver::option_symbol(next_month, strike, false);
        let buy_ce = SymbolResolver::option_symbol(next_month, strike, true);
        vec![
            LegRequest { symbol: sell_pe, action: OrderAction::Sell, quantity: position.quantity, signal_price: reference_price },
            LegRequest { symbol: buy_ce, action: OrderAction::Buy, quantity: position.quantity, signal_price: reference_price },
        ]
    } else {
        let symbol = SymbolResolver::futures_symbol(instrument.id, next_month);
        vec![LegRequest { symbol, action: OrderAction::Buy, quantity: position.quantity, signal_price: reference_price }]
    }
}

/// Best-effort expiry estimate from the stored `contract_month` string
/// (last day of that calendar month); the dedicated expiry calendar named
/// in §3 ("Symbol/Expiry Resolver") is out of scope for this pass.
fn current_expiry(position: &Position) -> Option<NaiveDate> {
    current_contract_month(position).and_then(|month| last_day_of_month(month.year(), month.month()))
}

/// The position's current contract month as the first of that calendar
/// month, parsed from the stored `contract_month` string.
fn current_contract_month(position: &Position) -> Option<NaiveDate> {
    let month_str = match &position.legs {
        ExecutionLegs::Futures { contract_month, .. } => contract_month.clone(),
        ExecutionLegs::Synthetic { .. } => return None,
    };
    let (y, m) = month_str.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Next tradeable contract month after `current`, per the instrument's
/// `ContractMonthRule`. `MonthlyWeekly` and `EveryMonth` both just add one
/// calendar month; `FixedMonths` (Silver Mini) skips ahead to the next
/// month in its own cycle, wrapping into next year past the last one.
fn next_contract_month(current: NaiveDate, rule: ContractMonthRule) -> NaiveDate {
    match rule {
        ContractMonthRule::FixedMonths(months) => next_fixed_month(current, months),
        ContractMonthRule::MonthlyWeekly | ContractMonthRule::EveryMonth => {
            let (year, month) = if current.month() == 12 { (current.year() + 1, 1) } else { (current.year(), current.month() + 1) };
            NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(current)
        }
    }
}

fn next_fixed_month(current: NaiveDate, months: &[u32]) -> NaiveDate {
    let mut sorted: Vec<u32> = months.to_vec();
    sorted.sort_unstable();
    match sorted.iter().find(|&&m| m > current.month()) {
        Some(&m) => NaiveDate::from_ymd_opt(current.year(), m, 1).unwrap_or(current),
        None => NaiveDate::from_ymd_opt(current.year() + 1, sorted[0], 1).unwrap_or(current),
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).map(|d| d.pred_opt().unwrap_or(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_contract_month_rolls_into_january() {
        let dec = NaiveDate::from_ymd_opt(2026, 12, 15).unwrap();
        let next = next_contract_month(dec, ContractMonthRule::EveryMonth);
        assert_eq!(next, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn next_contract_month_respects_silver_minis_fixed_cycle() {
        let rule = ContractMonthRule::FixedMonths(&[2, 4, 6, 8, 11]);
        // From August, the next cycle month is November, not September.
        let aug = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(next_contract_month(aug, rule), NaiveDate::from_ymd_opt(2026, 11, 1).unwrap());

        // Past the last cycle month of the year, it wraps to February next year.
        let dec = NaiveDate::from_ymd_opt(2026, 11, 20).unwrap();
        assert_eq!(next_contract_month(dec, rule), NaiveDate::from_ymd_opt(2027, 2, 1).unwrap());
    }

    #[test]
    fn last_day_of_month_handles_february() {
        assert_eq!(last_day_of_month(2026, 2), NaiveDate::from_ymd_opt(2026, 2, 28));
    }
}
