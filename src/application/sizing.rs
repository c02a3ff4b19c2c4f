//! Tom Basso three-constraint position sizer (§4.3).
//!
//! Generalizes `Zuytan-rustrade`'s `SizingEngine::calculate_quantity`
//! (`application/risk_management/sizing_engine.rs`): instead of one
//! Kelly-capped cash amount, three independent lot candidates are computed
//! from risk, volatility, and margin headroom, and the position takes the
//! most conservative of the three.

use crate::config::{EquityMode, PortfolioEnvConfig};
use crate::domain::instrument::Instrument;
use crate::domain::portfolio::PortfolioState;
use crate::domain::position::LimiterTag;
use crate::domain::signal::{Layer, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::info;

/// Per-candidate detail, folded into `signal_audit.sizing_json` for audit.
#[derive(Debug, Clone, Serialize)]
pub struct SizingCandidate {
    pub lots: i64,
    pub basis_amount: Decimal,
    pub per_lot_cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizingResult {
    pub final_lots: i64,
    pub limiter: LimiterTag,
    pub risk: SizingCandidate,
    pub volatility: SizingCandidate,
    pub margin: SizingCandidate,
    pub er_adjustment: Option<Decimal>,
    pub raw_lots_before_er: i64,
}

impl SizingResult {
    pub fn is_zero_lot(&self) -> bool {
        self.final_lots <= 0
    }
}

pub struct PositionSizer;

impl PositionSizer {
    /// Computes the lot count per §4.3. The effective-equity basis defaults
    /// to `equity_high` (the high-watermark) but follows
    /// `PortfolioEnvConfig::equity_mode` — see `effective_equity`.
    /// `open_unrealized_pnl` is the portfolio's total mark-to-market P&L
    /// across open positions, needed only in `open`/`blended` mode.
    pub fn size(
        instrument: &Instrument,
        portfolio: &PortfolioState,
        config: &PortfolioEnvConfig,
        signal: &Signal,
        layer: Layer,
        open_unrealized_pnl: Decimal,
    ) -> SizingResult {
        let equity_basis = Self::effective_equity(portfolio, config, open_unrealized_pnl);
        let (risk_pct, vol_pct) = Self::layer_rates(instrument, layer);

        let point_move = (signal.price - signal.stop).abs();
        let risk_basis = equity_basis * risk_pct;
        let risk_per_lot = point_move * instrument.point_value;
        let lot_r = floor_div(risk_basis, risk_per_lot);

        let vol_basis = equity_basis * vol_pct;
        let vol_per_lot = signal.atr * instrument.point_value;
        let lot_v = floor_div(vol_basis, vol_per_lot);

        let margin_headroom = (config.max_margin_util_pct / dec!(100)) * equity_basis - portfolio.margin_used;
        let lot_m = floor_div(margin_headroom, instrument.margin_per_lot);

        let raw_lots = lot_r.min(lot_v).min(lot_m).max(0);

        let limiter = if raw_lots <= 0 {
            LimiterTag::Floor
        } else if raw_lots == lot_r {
            LimiterTag::Risk
        } else if raw_lots == lot_v {
            LimiterTag::Volatility
        } else {
            LimiterTag::Margin
        };

        let (final_lots, er_adjustment) = match signal.er {
            Some(er) if raw_lots > 0 => {
                let factor = er.clamp(dec!(0.1), dec!(1.0));
                let adjusted = (Decimal::from(raw_lots) * factor)
                    .to_i64()
                    .unwrap_or(raw_lots);
                (adjusted.max(0), Some(factor))
            }
            _ => (raw_lots, None),
        };

        info!(
            instrument = %instrument.id,
            layer = layer.label(),
            lot_r, lot_v, lot_m,
            raw_lots, final_lots,
            limiter = ?limiter,
            "position sizing computed"
        );

        SizingResult {
            final_lots,
            limiter,
            raw_lots_before_er: raw_lots,
            er_adjustment,
            risk: SizingCandidate {
                lots: lot_r,
                basis_amount: risk_basis,
                per_lot_cost: risk_per_lot,
            },
            volatility: SizingCandidate {
                lots: lot_v,
                basis_amount: vol_basis,
                per_lot_cost: vol_per_lot,
            },
            margin: SizingCandidate {
                lots: lot_m,
                basis_amount: margin_headroom,
                per_lot_cost: instrument.margin_per_lot,
            },
        }
    }

    /// §6 `equity.mode`: `closed` sizes off `equity_high` alone (Tom Basso's
    /// convention, constant through drawdowns); `open` adds the live
    /// unrealized P&L in full; `blended` adds it weighted by
    /// `blended_unrealized_weight`.
    fn effective_equity(portfolio: &PortfolioState, config: &PortfolioEnvConfig, open_unrealized_pnl: Decimal) -> Decimal {
        match config.equity_mode {
            EquityMode::Closed => portfolio.equity_high,
            EquityMode::Open => portfolio.equity_high + open_unrealized_pnl,
            EquityMode::Blended => portfolio.equity_high + open_unrealized_pnl * config.blended_unrealized_weight,
        }
    }

    /// BASE_ENTRY uses the instrument's initial rates; each pyramid layer
    /// beyond the base halves the ongoing rate again (§4.3 layer-specific
    /// risk%/vol%).
    fn layer_rates(instrument: &Instrument, layer: Layer) -> (Decimal, Decimal) {
        if layer.is_base() {
            return (instrument.initial_risk_pct, instrument.initial_vol_pct);
        }
        let halvings = (layer.0 - 1) as u32;
        let divisor = Decimal::from(2i64.pow(halvings.min(6)));
        (
            instrument.ongoing_risk_pct / divisor,
            instrument.ongoing_vol_pct / divisor,
        )
    }
}

/// `floor(numerator / denominator)`, treating a non-positive or zero
/// denominator as "no lots affordable" rather than dividing by zero.
fn floor_div(numerator: Decimal, denominator: Decimal) -> i64 {
    if denominator <= Decimal::ZERO || numerator <= Decimal::ZERO {
        return 0;
    }
    (numerator / denominator).trunc().to_i64().unwrap_or(0)
}
