//! Portfolio risk caps, pyramid gate thresholds, and equity-basis mode
//! (§6 "Configuration": `portfolio`, `pyramid_gates`, `equity`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquityMode {
    Closed,
    Open,
    Blended,
}

impl FromStr for EquityMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "closed" => Ok(EquityMode::Closed),
            "open" => Ok(EquityMode::Open),
            "blended" => Ok(EquityMode::Blended),
            _ => anyhow::bail!("Invalid EQUITY_MODE: {s}. Must be 'closed', 'open', or 'blended'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortfolioEnvConfig {
    pub max_portfolio_risk_pct: Decimal,
    pub max_vol_pct: Decimal,
    pub max_margin_util_pct: Decimal,

    pub pyramid_risk_warning_pct: Decimal,
    pub pyramid_risk_block_pct: Decimal,
    pub pyramid_vol_block_pct: Decimal,
    pub use_1r_gate: bool,
    pub atr_pyramid_spacing: Decimal,

    pub equity_mode: EquityMode,
    pub blended_unrealized_weight: Decimal,
}

impl PortfolioEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_portfolio_risk_pct: Self::parse_decimal("MAX_PORTFOLIO_RISK_PCT", 15.0)?,
            max_vol_pct: Self::parse_decimal("MAX_VOL_PCT", 5.0)?,
            max_margin_util_pct: Self::parse_decimal("MAX_MARGIN_UTIL_PCT", 60.0)?,

            pyramid_risk_warning_pct: Self::parse_decimal("PYRAMID_RISK_WARNING_PCT", 10.0)?,
            pyramid_risk_block_pct: Self::parse_decimal("PYRAMID_RISK_BLOCK_PCT", 12.0)?,
            pyramid_vol_block_pct: Self::parse_decimal("PYRAMID_VOL_BLOCK_PCT", 4.0)?,
            use_1r_gate: Self::parse_bool("USE_1R_GATE", true),
            atr_pyramid_spacing: Self::parse_decimal("ATR_PYRAMID_SPACING", 0.5)?,

            equity_mode: env::var("EQUITY_MODE")
                .ok()
                .map(|s| EquityMode::from_str(&s))
                .transpose()?
                .unwrap_or(EquityMode::Closed),
            blended_unrealized_weight: Self::parse_decimal("BLENDED_UNREALIZED_WEIGHT", 0.5)?,
        })
    }

    fn parse_decimal(key: &str, default: f64) -> Result<Decimal> {
        let raw = env::var(key).unwrap_or_else(|_| default.to_string());
        let f: f64 = raw.parse().with_context(|| format!("Failed to parse {key}"))?;
        Decimal::from_f64(f).with_context(|| format!("{key} is not a representable decimal"))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_fixed_option_set() {
        let cfg = PortfolioEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(cfg.max_portfolio_risk_pct, Decimal::from_f64(15.0).unwrap());
        assert_eq!(cfg.pyramid_risk_block_pct, Decimal::from_f64(12.0).unwrap());
        assert!(matches!(cfg.equity_mode, EquityMode::Closed));
    }

    #[test]
    fn equity_mode_parses_case_insensitively() {
        assert!(matches!(EquityMode::from_str("OPEN").unwrap(), EquityMode::Open));
        assert!(EquityMode::from_str("nonsense").is_err());
    }
}
