//! `POST /emergency/{stop,resume,close-all}` (§6): authenticated via
//! `auth::require_api_key`, layered in front of this router in `mod.rs`.

use crate::domain::errors::LeadershipError;
use crate::domain::ports::{Notification, NotificationSeverity};
use crate::interfaces::http::state::ApiState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use tracing::warn;

/// Emergency endpoints only make sense directed at the instance that is
/// actually driving the engine; a non-leader returns 503 so the caller
/// retries against the current leader instead of silently no-opping.
fn require_leader(state: &ApiState) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    if state.engine.is_leader.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": LeadershipError.to_string() })),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    reason: String,
}

pub async fn stop(State(state): State<ApiState>, Json(req): Json<StopRequest>) -> impl IntoResponse {
    if let Err(rejection) = require_leader(&state) {
        return rejection.into_response();
    }
    state.engine.trading_paused.store(true, Ordering::SeqCst);
    warn!(reason = %req.reason, "trading paused via emergency stop");
    state
        .engine
        .notifier
        .notify(Notification {
            severity: NotificationSeverity::Critical,
            title: "trading paused".to_string(),
            body: req.reason,
            instrument: None,
        })
        .await
        .ok();
    (StatusCode::OK, Json(serde_json::json!({ "trading_paused": true }))).into_response()
}

pub async fn resume(State(state): State<ApiState>) -> impl IntoResponse {
    if let Err(rejection) = require_leader(&state) {
        return rejection.into_response();
    }
    state.engine.trading_paused.store(false, Ordering::SeqCst);
    warn!("trading resumed via emergency endpoint");
    (StatusCode::OK, Json(serde_json::json!({ "trading_paused": false }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CloseAllRequest {
    #[serde(default)]
    dry_run: bool,
}

pub async fn close_all(State(state): State<ApiState>, Json(req): Json<CloseAllRequest>) -> impl IntoResponse {
    if let Err(rejection) = require_leader(&state) {
        return rejection.into_response();
    }
    match state.engine.emergency_close_all(req.dry_run).await {
        Ok(position_ids) => Json(serde_json::json!({ "dry_run": req.dry_run, "position_ids": position_ids })).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}
