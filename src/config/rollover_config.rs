//! Rollover scheduler configuration (§6 "Configuration": `rollover`, §4.9).

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct RolloverEnvConfig {
    pub enabled: bool,
    pub bank_nifty_days: i64,
    pub gold_mini_days: i64,
    pub silver_mini_days: i64,
    pub copper_days: i64,
    pub max_retries: u32,
    pub retry_interval_sec: u64,
    pub strike_interval: u32,
    pub prefer_1000s: bool,
}

impl RolloverEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            enabled: Self::parse_bool("ROLLOVER_ENABLED", true),
            bank_nifty_days: Self::parse_i64("ROLLOVER_BANK_NIFTY_DAYS", 2)?,
            gold_mini_days: Self::parse_i64("ROLLOVER_GOLD_MINI_DAYS", 8)?,
            silver_mini_days: Self::parse_i64("ROLLOVER_SILVER_MINI_DAYS", 8)?,
            copper_days: Self::parse_i64("ROLLOVER_COPPER_DAYS", 8)?,
            max_retries: Self::parse_u32("ROLLOVER_MAX_RETRIES", 3)?,
            retry_interval_sec: Self::parse_u64("ROLLOVER_RETRY_INTERVAL_SEC", 60)?,
            strike_interval: Self::parse_u32("ROLLOVER_STRIKE_INTERVAL", 100)?,
            prefer_1000s: Self::parse_bool("ROLLOVER_PREFER_1000S", true),
        })
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<i64>()
            .with_context(|| format!("Failed to parse {key}"))
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u32>()
            .with_context(|| format!("Failed to parse {key}"))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {key}"))
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
    fn defaults_match_instrument_lookahead_days() {
        let cfg = RolloverEnvConfig::from_env().unwrap();
        assert_eq!(cfg.bank_nifty_days, 2);
        assert_eq!(cfg.gold_mini_days, 8);
    }
}
