//! Portfolio State — the single-row aggregate described in §3.
//!
//! Generalizes `Zuytan-rustrade`'s `VersionedPortfolio` pattern
//! (`application/monitoring/portfolio_state_manager.rs`) from an in-memory
//! snapshot to the persisted, optimistically-locked single row this spec
//! requires.

use crate::domain::instrument::{Instrument, InstrumentId};
use crate::domain::position::Position;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_capital: Decimal,
    pub closed_equity: Decimal,
    /// High-watermark of `closed_equity`, never decreases. Tom Basso sizing
    /// basis (§4.3).
    pub equity_high: Decimal,
    pub total_risk_amount: Decimal,
    pub total_risk_pct: Decimal,
    pub total_vol_amount: Decimal,
    pub total_vol_pct: Decimal,
    pub margin_used: Decimal,
    pub version: i64,
}

impl PortfolioState {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            closed_equity: initial_capital,
            equity_high: initial_capital,
            total_risk_amount: Decimal::ZERO,
            total_risk_pct: Decimal::ZERO,
            total_vol_amount: Decimal::ZERO,
            total_vol_pct: Decimal::ZERO,
            margin_used: Decimal::ZERO,
            version: 0,
        }
    }

    pub fn margin_utilization_pct(&self) -> Decimal {
        if self.equity_high <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.margin_used / self.equity_high) * dec!(100)
    }

    /// §3: `closed_equity` is the running ledger total; `equity_high` is a
    /// monotonic max observed only at close events.
    pub fn apply_realized_pnl(&mut self, signed_amount: Decimal) {
        self.closed_equity += signed_amount;
        if self.closed_equity > self.equity_high {
            self.equity_high = self.closed_equity;
        }
    }

    /// §3 hard cap: portfolio risk % must stay at or below 15%.
    pub fn exceeds_hard_cap(&self, hard_cap_pct: Decimal) -> bool {
        self.total_risk_pct >= hard_cap_pct
    }

    /// Recomputes `total_risk_amount`/`total_vol_amount` (and their
    /// percentages of `equity_high`) from every currently open position, so
    /// the hard cap and the portfolio/instrument pyramid gates (§4.4) see
    /// live exposure rather than the zeros a fresh row starts with.
    pub fn recompute_exposure(&mut self, open_positions: &[Position], instruments: &HashMap<InstrumentId, Instrument>) {
        let mut risk_amount = Decimal::ZERO;
        let mut vol_amount = Decimal::ZERO;
        for position in open_positions {
            let Some(instrument) = instruments.get(&position.instrument) else { continue };
            risk_amount += (position.entry_price - position.initial_stop).abs() * instrument.point_value * position.lots;
            vol_amount += position.atr_at_entry * instrument.point_value * position.lots;
        }
        self.total_risk_amount = risk_amount;
        self.total_vol_amount = vol_amount;
        if self.equity_high > Decimal::ZERO {
            self.total_risk_pct = risk_amount / self.equity_high * dec!(100);
            self.total_vol_pct = vol_amount / self.equity_high * dec!(100);
        } else {
            self.total_risk_pct = Decimal::ZERO;
            self.total_vol_pct = Decimal::ZERO;
        }
    }
}
