//! Database and Redis coordination endpoints (ambient stack: `sqlx` Postgres
//! pool, `redis` leader-election lock). Mirrors `Zuytan-rustrade`'s
//! `DATABASE_URL` convention in `application/system.rs`.

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct PersistenceEnvConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub redis_url: String,
    pub leader_lock_ttl_seconds: u64,
    pub leader_renew_interval_seconds: u64,
}

impl PersistenceEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/trend_portfolio_engine".to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Failed to parse DATABASE_MAX_CONNECTIONS")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            leader_lock_ttl_seconds: env::var("LEADER_LOCK_TTL_SECONDS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .context("Failed to parse LEADER_LOCK_TTL_SECONDS")?,
            leader_renew_interval_seconds: env::var("LEADER_RENEW_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Failed to parse LEADER_RENEW_INTERVAL_SECONDS")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_postgres_and_redis() {
        let cfg = PersistenceEnvConfig::from_env().unwrap();
        assert!(cfg.database_url.starts_with("postgres://"));
        assert!(cfg.redis_url.starts_with("redis://"));
        assert!(cfg.leader_lock_ttl_seconds > cfg.leader_renew_interval_seconds);
    }
}
