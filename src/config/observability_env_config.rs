//! Tracing/log level and HTTP bind address (ambient stack, generalized from
//! `Zuytan-rustrade`'s `config/observability_config.rs`).

use std::env;

#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub log_filter: String,
    pub http_bind_address: String,
    pub http_port: u16,
    pub instance_id: String,
    pub webhook_url: Option<String>,
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        Self {
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            http_bind_address: env::var("HTTP_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            instance_id: env::var("INSTANCE_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()),
            webhook_url: env::var("NOTIFIER_WEBHOOK_URL").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_all_interfaces_on_8080() {
        let cfg = ObservabilityEnvConfig::from_env();
        assert_eq!(cfg.http_bind_address, "0.0.0.0");
        assert_eq!(cfg.http_port, 8080);
        assert!(!cfg.instance_id.is_empty());
    }
}
