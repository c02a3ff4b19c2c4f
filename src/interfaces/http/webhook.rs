//! `POST /webhook` (§6): 200 on accepted, duplicate, or business-rule
//! rejection (body carries the outcome); 4xx only for malformed input;
//! 5xx only for internal failure.

use crate::domain::signal::parse_signal;
use crate::interfaces::http::state::ApiState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use tracing::{error, warn};

pub async fn handle_webhook(State(state): State<ApiState>, Json(payload): Json<serde_json::Value>) -> impl IntoResponse {
    let signal = match parse_signal(payload, Utc::now()) {
        Ok(signal) => signal,
        Err(err) => {
            warn!(error = %err, "rejected malformed webhook payload");
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": err.to_string() }))).into_response();
        }
    };

    match state.engine.process_signal(signal).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => {
            error!(error = %err, "internal failure processing signal");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": "internal failure" }))).into_response()
        }
    }
}
