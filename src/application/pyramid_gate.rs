//! Pyramid gating: instrument, portfolio, and profit predicate groups, plus
//! the portfolio-wide hard risk cap (§4.4).
//!
//! The 1R-gate predicate named in this section overlaps with the validator's
//! freshness/divergence checks (§4.2); this crate runs it once, in
//! `validator::SignalValidator::check_1r_gate`, gated by
//! `PortfolioEnvConfig::use_1r_gate` — see DESIGN.md.

use crate::config::PortfolioEnvConfig;
use crate::domain::errors::RiskError;
use crate::domain::instrument::Instrument;
use crate::domain::portfolio::PortfolioState;
use crate::domain::pyramiding::PyramidingState;
use crate::domain::signal::Signal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub struct PyramidGate;

impl PyramidGate {
    /// §4.4: blocks all new entries (base and pyramid) regardless of other
    /// state once portfolio risk reaches the hard cap.
    pub fn check_hard_cap(portfolio: &PortfolioState, config: &PortfolioEnvConfig) -> Result<(), RiskError> {
        if portfolio.exceeds_hard_cap(config.max_portfolio_risk_pct) {
            return Err(RiskError::PortfolioRiskCap {
                current_pct: portfolio.total_risk_pct,
                cap_pct: config.max_portfolio_risk_pct,
            });
        }
        Ok(())
    }

    /// §4.4 "Instrument gate": pyramid count bound; ATR spacing from the
    /// last pyramid entry. Base-presence ("base position exists and is
    /// open") is checked by the engine before this is called — see
    /// `ValidationError::MissingBase` — since a pyramid signal with no open
    /// base never reaches the gate at all.
    pub fn check_instrument_gate(
        instrument: &Instrument,
        open_layer_count: u32,
        pyramiding: Option<&PyramidingState>,
        signal: &Signal,
        config: &PortfolioEnvConfig,
    ) -> Result<(), RiskError> {
        if open_layer_count >= instrument.max_pyramids {
            return Err(RiskError::MaxPyramidsReached {
                instrument: instrument.id.as_str().to_string(),
                max_pyramids: instrument.max_pyramids,
            });
        }

        if let Some(state) = pyramiding {
            let required_move = signal.atr * config.atr_pyramid_spacing;
            let moved = (signal.price - state.last_pyramid_entry_price).abs();
            if moved < required_move {
                return Err(RiskError::PyramidSpacingNotMet { required_move });
            }
        }

        Ok(())
    }

    /// §4.4 "Portfolio gate": risk/volatility/margin-utilization block
    /// thresholds, independent of and tighter than the hard cap.
    pub fn check_portfolio_gate(portfolio: &PortfolioState, config: &PortfolioEnvConfig) -> Result<(), RiskError> {
        if portfolio.total_risk_pct >= config.pyramid_risk_block_pct {
            return Err(RiskError::PortfolioGateRiskBlock {
                current_pct: portfolio.total_risk_pct,
                block_pct: config.pyramid_risk_block_pct,
            });
        }
        if portfolio.total_vol_pct >= config.pyramid_vol_block_pct {
            return Err(RiskError::PortfolioGateVolBlock {
                current_pct: portfolio.total_vol_pct,
                block_pct: config.pyramid_vol_block_pct,
            });
        }
        let margin_util = portfolio.margin_utilization_pct();
        let margin_block_pct = dec!(50);
        if margin_util >= margin_block_pct {
            return Err(RiskError::PortfolioGateMarginBlock {
                current_pct: margin_util,
                block_pct: margin_block_pct,
            });
        }
        Ok(())
    }

    /// §4.4 "Profit gate": combined unrealized P&L must be positive AND this
    /// instrument's unrealized P&L must exceed its base risk amount.
    pub fn check_profit_gate(
        combined_unrealized: Decimal,
        instrument_unrealized: Decimal,
        base_risk: Decimal,
    ) -> Result<(), RiskError> {
        if combined_unrealized <= Decimal::ZERO || instrument_unrealized <= base_risk {
            return Err(RiskError::ProfitGateNotMet {
                combined: combined_unrealized,
                instrument_unrealized,
                base_risk,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentId;
    use crate::domain::signal::{Layer, SignalKind};

    fn cfg() -> PortfolioEnvConfig {
        PortfolioEnvConfig {
            max_portfolio_risk_pct: dec!(15),
            max_vol_pct: dec!(5),
            max_margin_util_pct: dec!(60),
            pyramid_risk_warning_pct: dec!(10),
            pyramid_risk_block_pct: dec!(12),
            pyramid_vol_block_pct: dec!(4),
            use_1r_gate: true,
            atr_pyramid_spacing: dec!(0.5),
            equity_mode: crate::config::EquityMode::Closed,
            blended_unrealized_weight: dec!(0.5),
        }
    }

    #[test]
    fn hard_cap_blocks_at_15_pct() {
        let mut portfolio = PortfolioState::new(dec!(5_000_000));
        portfolio.total_risk_pct = dec!(15.0);
        assert!(PyramidGate::check_hard_cap(&portfolio, &cfg()).is_err());
    }

    #[test]
    fn portfolio_gate_blocks_at_12_3_pct_matches_scenario_3() {
        let mut portfolio = PortfolioState::new(dec!(5_000_000));
        portfolio.total_risk_pct = dec!(12.3);
        let err = PyramidGate::check_portfolio_gate(&portfolio, &cfg()).unwrap_err();
        assert_eq!(err.code(), "PORTFOLIO_GATE_RISK_BLOCK");
    }

    #[test]
    fn profit_gate_requires_both_conditions() {
        assert!(PyramidGate::check_profit_gate(dec!(1000), dec!(500), dec!(200)).is_ok());
        assert!(PyramidGate::check_profit_gate(dec!(-1), dec!(500), dec!(200)).is_err());
        assert!(PyramidGate::check_profit_gate(dec!(1000), dec!(100), dec!(200)).is_err());
    }

    #[test]
    fn instrument_gate_blocks_past_max_pyramids() {
        let instrument = Instrument::catalog().remove(&InstrumentId::BankNifty).unwrap();
        let signal = Signal {
            kind: SignalKind::Pyramid,
            instrument: InstrumentId::BankNifty,
            layer: Some(Layer(6)),
            signal_timestamp: chrono::Utc::now(),
            price: dec!(52300),
            stop: dec!(52000),
            suggested_lots: None,
            atr: dec!(350),
            er: None,
            supertrend: None,
            roc: None,
            reason: None,
            raw: serde_json::json!({}),
        };
        let err = PyramidGate::check_instrument_gate(&instrument, instrument.max_pyramids, None, &signal, &cfg())
            .unwrap_err();
        assert_eq!(err.code(), "MAX_PYRAMIDS_REACHED");
    }

    #[test]
    fn instrument_gate_blocks_when_spacing_not_met() {
        let instrument = Instrument::catalog().remove(&InstrumentId::BankNifty).unwrap();
        let pyramiding = PyramidingState::new(InstrumentId::BankNifty, "BANK_NIFTY_Long_1".into(), dec!(52100));
        let signal = Signal {
            kind: SignalKind::Pyramid,
            instrument: InstrumentId::BankNifty,
            layer: Some(Layer(2)),
            signal_timestamp: chrono::Utc::now(),
            price: dec!(52150), // only 50 points from last pyramid; needs atr*0.5 = 175
            stop: dec!(52000),
            suggested_lots: None,
            atr: dec!(350),
            er: None,
            supertrend: None,
            roc: None,
            reason: None,
            raw: serde_json::json!({}),
        };
        let err =
            PyramidGate::check_instrument_gate(&instrument, 1, Some(&pyramiding), &signal, &cfg()).unwrap_err();
        assert_eq!(err.code(), "PYRAMID_SPACING_NOT_MET");
    }
}
