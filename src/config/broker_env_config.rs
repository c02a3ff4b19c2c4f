//! Broker adapter credentials and base URL (§6 "Broker port"). Generalizes
//! `Zuytan-rustrade`'s per-vendor `broker_config.rs` (Alpaca/Oanda/Binance)
//! into the single NFO/MCX broker this engine speaks to.

use std::env;

#[derive(Debug, Clone)]
pub struct BrokerEnvConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl BrokerEnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("BROKER_API_KEY").unwrap_or_default(),
            api_secret: env::var("BROKER_API_SECRET").unwrap_or_default(),
            base_url: env::var("BROKER_BASE_URL")
                .unwrap_or_else(|_| "https://api.broker.example".to_string()),
            request_timeout_ms: env::var("BROKER_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
        }
    }
}
