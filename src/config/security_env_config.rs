//! Shared secret for emergency endpoints (§6 "Emergency / safety").

use std::env;

#[derive(Debug, Clone)]
pub struct SecurityEnvConfig {
    pub emergency_api_key: String,
}

impl SecurityEnvConfig {
    pub fn from_env() -> Self {
        Self {
            emergency_api_key: env::var("EMERGENCY_API_KEY").unwrap_or_default(),
        }
    }
}
