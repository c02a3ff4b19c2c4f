//! End-of-day monitor and order-execution configuration (§6 "Configuration":
//! `eod`, `execution`, `market_hours`; §4.9, §4.6).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct EodEnvConfig {
    pub enabled: bool,
    pub monitoring_start_minutes: u32,
    pub condition_check_seconds: u64,
    pub execution_seconds: u64,
    pub tracking_seconds: u64,
    pub order_timeout_seconds: u64,
    pub limit_buffer_pct: Decimal,
    pub fallback_to_market: bool,
    pub max_signal_age_seconds: i64,
}

impl EodEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            enabled: Self::parse_bool("EOD_ENABLED", true),
            monitoring_start_minutes: Self::parse_u32("EOD_MONITORING_START_MINUTES", 20)?,
            condition_check_seconds: Self::parse_u64("EOD_CONDITION_CHECK_SECONDS", 15)?,
            execution_seconds: Self::parse_u64("EOD_EXECUTION_SECONDS", 25)?,
            tracking_seconds: Self::parse_u64("EOD_TRACKING_SECONDS", 60)?,
            order_timeout_seconds: Self::parse_u64("EOD_ORDER_TIMEOUT_SECONDS", 20)?,
            limit_buffer_pct: Self::parse_decimal("EOD_LIMIT_BUFFER_PCT", 0.1)?,
            fallback_to_market: Self::parse_bool("EOD_FALLBACK_TO_MARKET", true),
            max_signal_age_seconds: Self::parse_i64("MAX_SIGNAL_AGE_SECONDS", 30)?,
        })
    }

    fn parse_u32(key: &str, default: u32) -> Result<u32> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse().with_context(|| format!("Failed to parse {key}"))
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse().with_context(|| format!("Failed to parse {key}"))
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse().with_context(|| format!("Failed to parse {key}"))
    }

    fn parse_decimal(key: &str, default: f64) -> Result<Decimal> {
        let raw = env::var(key).unwrap_or_else(|_| default.to_string());
        let f: f64 = raw.parse().with_context(|| format!("Failed to parse {key}"))?;
        Decimal::from_f64(f).with_context(|| format!("{key} is not a representable decimal"))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<bool>().unwrap_or(default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    SimpleLimit,
    Progressive,
}

impl FromStr for ExecutionStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple_limit" => Ok(ExecutionStrategy::SimpleLimit),
            "progressive" => Ok(ExecutionStrategy::Progressive),
            _ => anyhow::bail!("Invalid EXECUTION_STRATEGY: {s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialFillStrategy {
    AcceptAndReconcile,
    CancelRemainder,
}

impl FromStr for PartialFillStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_and_reconcile" => Ok(PartialFillStrategy::AcceptAndReconcile),
            "cancel_remainder" => Ok(PartialFillStrategy::CancelRemainder),
            _ => anyhow::bail!("Invalid PARTIAL_FILL_STRATEGY: {s}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionEnvConfig {
    pub strategy: ExecutionStrategy,
    pub max_attempts: u32,
    pub signal_validation_enabled: bool,
    pub partial_fill_strategy: PartialFillStrategy,
    pub partial_fill_wait_timeout_seconds: u64,
}

impl ExecutionEnvConfig {
    pub fn from_env() -> Result<Self> {
        let strategy = env::var("EXECUTION_STRATEGY")
            .ok()
            .map(|s| ExecutionStrategy::from_str(&s))
            .transpose()?
            .unwrap_or(ExecutionStrategy::Progressive);

        let partial_fill_strategy = env::var("PARTIAL_FILL_STRATEGY")
            .ok()
            .map(|s| PartialFillStrategy::from_str(&s))
            .transpose()?
            .unwrap_or(PartialFillStrategy::AcceptAndReconcile);

        Ok(Self {
            strategy,
            max_attempts: env::var("EXECUTION_MAX_ATTEMPTS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("Failed to parse EXECUTION_MAX_ATTEMPTS")?,
            signal_validation_enabled: env::var("SIGNAL_VALIDATION_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            partial_fill_strategy,
            partial_fill_wait_timeout_seconds: env::var("PARTIAL_FILL_WAIT_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Failed to parse PARTIAL_FILL_WAIT_TIMEOUT_SECONDS")?,
        })
    }
}

/// NSE/MCX session boundaries; MCX additionally varies by season (§4.7, §6).
#[derive(Debug, Clone)]
pub struct MarketHoursEnvConfig {
    pub nse_start: String,
    pub nse_end: String,
    pub mcx_start: String,
    pub mcx_end: String,
    pub mcx_summer_close: String,
    pub mcx_winter_close: String,
}

impl MarketHoursEnvConfig {
    pub fn from_env() -> Self {
        Self {
            nse_start: env::var("NSE_START").unwrap_or_else(|_| "09:15".to_string()),
            nse_end: env::var("NSE_END").unwrap_or_else(|_| "15:30".to_string()),
            mcx_start: env::var("MCX_START").unwrap_or_else(|_| "09:00".to_string()),
            mcx_end: env::var("MCX_END").unwrap_or_else(|_| "23:30".to_string()),
            mcx_summer_close: env::var("MCX_SUMMER_CLOSE").unwrap_or_else(|_| "23:30".to_string()),
            mcx_winter_close: env::var("MCX_WINTER_CLOSE").unwrap_or_else(|_| "23:55".to_string()),
        }
    }
}
