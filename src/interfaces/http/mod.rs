//! Axum HTTP surface (§6): inbound webhook, read-only queries, and
//! authenticated emergency controls.

pub mod auth;
pub mod emergency;
pub mod read;
pub mod state;
pub mod webhook;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use state::ApiState;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: ApiState) -> Router {
    let emergency_routes = Router::new()
        .route("/emergency/stop", post(emergency::stop))
        .route("/emergency/resume", post(emergency::resume))
        .route("/emergency/close-all", post(emergency::close_all))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/status", get(read::status))
        .route("/positions", get(read::positions))
        .route("/health", get(read::health))
        .route("/signals", get(read::signals))
        .route("/trades", get(read::trades))
        .route("/config", get(read::config))
        .route("/webhook/stats", get(read::webhook_stats))
        .route("/rollover/status", get(read::rollover_status))
        .route("/eod/status", get(read::eod_status))
        .route("/holidays/:exchange", get(read::holidays))
        .merge(emergency_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
