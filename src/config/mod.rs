//! Configuration, organized by domain: broker, portfolio risk, rollover,
//! EOD/execution, persistence, observability, security. Loaded once from
//! environment variables at process start (§6: "fixed option set; all
//! changes require restart").
//!
//! Follows `Zuytan-rustrade`'s `config/mod.rs` split-and-aggregate shape:
//! sub-configs parse independently, `Config::from_env()` composes them.

mod broker_env_config;
mod eod_config;
mod observability_env_config;
mod persistence_env_config;
mod portfolio_config;
mod rollover_config;
mod security_env_config;

pub use broker_env_config::BrokerEnvConfig;
pub use eod_config::{EodEnvConfig, ExecutionEnvConfig, ExecutionStrategy, MarketHoursEnvConfig, PartialFillStrategy};
pub use observability_env_config::ObservabilityEnvConfig;
pub use persistence_env_config::PersistenceEnvConfig;
pub use portfolio_config::{EquityMode, PortfolioEnvConfig};
pub use rollover_config::RolloverEnvConfig;
pub use security_env_config::SecurityEnvConfig;

use anyhow::{Context, Result};

/// Aggregates all sub-configs. Passed by value/reference into application
/// services rather than re-read from the environment at call sites.
#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerEnvConfig,
    pub portfolio: PortfolioEnvConfig,
    pub rollover: RolloverEnvConfig,
    pub eod: EodEnvConfig,
    pub execution: ExecutionEnvConfig,
    pub market_hours: MarketHoursEnvConfig,
    pub persistence: PersistenceEnvConfig,
    pub observability: ObservabilityEnvConfig,
    pub security: SecurityEnvConfig,
    pub initial_capital: rust_decimal::Decimal,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let portfolio = PortfolioEnvConfig::from_env().context("Failed to load portfolio config")?;
        let rollover = RolloverEnvConfig::from_env().context("Failed to load rollover config")?;
        let eod = EodEnvConfig::from_env().context("Failed to load EOD config")?;
        let execution = ExecutionEnvConfig::from_env().context("Failed to load execution config")?;
        let persistence = PersistenceEnvConfig::from_env().context("Failed to load persistence config")?;

        let initial_capital_f64: f64 = std::env::var("INITIAL_CAPITAL")
            .unwrap_or_else(|_| "5000000".to_string())
            .parse()
            .context("Failed to parse INITIAL_CAPITAL")?;
        let initial_capital = rust_decimal::Decimal::from_f64_retain(initial_capital_f64)
            .context("INITIAL_CAPITAL is not a representable decimal")?;

        Ok(Self {
            broker: BrokerEnvConfig::from_env(),
            portfolio,
            rollover,
            eod,
            execution,
            market_hours: MarketHoursEnvConfig::from_env(),
            persistence,
            observability: ObservabilityEnvConfig::from_env(),
            security: SecurityEnvConfig::from_env(),
            initial_capital,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_loads_with_all_defaults() {
        let config = Config::from_env().expect("should parse with defaults");
        assert_eq!(config.portfolio.max_portfolio_risk_pct, rust_decimal::Decimal::from(15));
        assert_eq!(config.observability.http_port, 8080);
    }
}
