//! Shared-secret check for emergency endpoints (§6: "emergency endpoints
//! require a shared X-API-KEY").

use crate::interfaces::http::state::ApiState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

pub async fn require_api_key(
    State(state): State<ApiState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = &state.config.security.emergency_api_key;
    if expected.is_empty() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let provided = headers.get("X-API-KEY").and_then(|v| v.to_str().ok());
    if provided != Some(expected.as_str()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}
