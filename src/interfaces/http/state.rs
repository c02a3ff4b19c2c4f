//! Shared axum handler state: the engine plus whatever the read/emergency
//! handlers need beyond `process_signal` itself.

use crate::application::engine::Engine;
use crate::config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub config: Arc<Config>,
}
