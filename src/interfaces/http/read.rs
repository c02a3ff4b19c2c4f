//! Read-only, non-sensitive query endpoints (§6).

use crate::domain::audit::AuditOutcome;
use crate::domain::instrument::Exchange;
use crate::interfaces::http::state::ApiState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use std::sync::atomic::Ordering;

pub async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    match state.engine.portfolio_repo.load().await {
        Ok(portfolio) => Json(serde_json::json!({
            "instance_id": state.engine.instance_id,
            "is_leader": state.engine.is_leader.load(Ordering::SeqCst),
            "trading_paused": state.engine.trading_paused.load(Ordering::SeqCst),
            "portfolio": portfolio,
        }))
        .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn positions(State(state): State<ApiState>) -> impl IntoResponse {
    match state.engine.position_repo.find_all_open().await {
        Ok(positions) => Json(positions).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    limit: Option<i64>,
    instrument: Option<String>,
    status: Option<String>,
}

fn parse_outcome(s: &str) -> Option<AuditOutcome> {
    match s.to_uppercase().as_str() {
        "PROCESSED" => Some(AuditOutcome::Processed),
        "REJECTED_VALIDATION" => Some(AuditOutcome::RejectedValidation),
        "REJECTED_RISK" => Some(AuditOutcome::RejectedRisk),
        "REJECTED_DUPLICATE" => Some(AuditOutcome::RejectedDuplicate),
        "REJECTED_MARKET" => Some(AuditOutcome::RejectedMarket),
        "REJECTED_MANUAL" => Some(AuditOutcome::RejectedManual),
        "FAILED_ORDER" => Some(AuditOutcome::FailedOrder),
        "PARTIAL_FILL" => Some(AuditOutcome::PartialFill),
        _ => None,
    }
}

pub async fn signals(State(state): State<ApiState>, Query(query): Query<SignalsQuery>) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let outcome = query.status.as_deref().and_then(parse_outcome);
    match state.engine.audit_repo.recent(limit, query.instrument.as_deref(), outcome).await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    since_hours: Option<i64>,
}

pub async fn trades(State(state): State<ApiState>, Query(query): Query<TradesQuery>) -> impl IntoResponse {
    let since = chrono::Utc::now() - chrono::Duration::hours(query.since_hours.unwrap_or(24 * 30));
    match state.engine.capital_repo.find_since(since).await {
        Ok(rows) => Json(rows).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

pub async fn config(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "portfolio": {
            "max_portfolio_risk_pct": state.config.portfolio.max_portfolio_risk_pct,
            "max_vol_pct": state.config.portfolio.max_vol_pct,
            "max_margin_util_pct": state.config.portfolio.max_margin_util_pct,
        },
        "pyramid_gates": {
            "risk_warning": state.config.portfolio.pyramid_risk_warning_pct,
            "risk_block": state.config.portfolio.pyramid_risk_block_pct,
            "vol_block": state.config.portfolio.pyramid_vol_block_pct,
            "use_1r_gate": state.config.portfolio.use_1r_gate,
            "atr_pyramid_spacing": state.config.portfolio.atr_pyramid_spacing,
        },
        "rollover": {
            "enabled": state.config.rollover.enabled,
            "bank_nifty_days": state.config.rollover.bank_nifty_days,
            "gold_mini_days": state.config.rollover.gold_mini_days,
            "silver_mini_days": state.config.rollover.silver_mini_days,
            "copper_days": state.config.rollover.copper_days,
            "max_retries": state.config.rollover.max_retries,
        },
        "eod": {
            "enabled": state.config.eod.enabled,
            "monitoring_start_minutes": state.config.eod.monitoring_start_minutes,
            "condition_check_seconds": state.config.eod.condition_check_seconds,
        },
        "execution": {
            "strategy": format!("{:?}", state.config.execution.strategy),
            "partial_fill_strategy": format!("{:?}", state.config.execution.partial_fill_strategy),
        },
    }))
}

pub async fn webhook_stats(State(state): State<ApiState>) -> impl IntoResponse {
    match state.engine.audit_repo.recent(1000, None, None).await {
        Ok(rows) => {
            let mut counts = std::collections::HashMap::new();
            for row in &rows {
                *counts.entry(format!("{:?}", row.outcome)).or_insert(0u64) += 1;
            }
            Json(serde_json::json!({ "sampled": rows.len(), "by_outcome": counts })).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

pub async fn rollover_status(State(state): State<ApiState>) -> impl IntoResponse {
    match state.engine.position_repo.find_all_open().await {
        Ok(positions) => {
            let pending: Vec<_> = positions
                .into_iter()
                .filter(|p| p.rollover_status != crate::domain::position::RolloverStatus::None)
                .collect();
            Json(pending).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "error": err.to_string() }))).into_response(),
    }
}

pub async fn eod_status(State(state): State<ApiState>) -> impl IntoResponse {
    let now = state.engine.clock.now();
    Json(serde_json::json!({
        "enabled": state.config.eod.enabled,
        "monitoring_start_minutes": state.config.eod.monitoring_start_minutes,
        "in_bank_nifty_window": state.engine.calendar.session_close(Exchange::Nfo, now.date_naive())
            .map(|close| (close - now.time()).num_minutes() <= state.config.eod.monitoring_start_minutes as i64)
            .unwrap_or(false),
    }))
}

pub async fn holidays(State(state): State<ApiState>, Path(exchange): Path<String>) -> impl IntoResponse {
    let exchange = match exchange.to_uppercase().as_str() {
        "NSE" | "NFO" => Exchange::Nfo,
        "MCX" => Exchange::Mcx,
        _ => return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "unknown exchange" }))).into_response(),
    };
    let today = state.engine.clock.now().date_naive();
    Json(serde_json::json!({ "exchange": exchange_str(exchange), "is_holiday_today": state.engine.calendar.is_holiday(exchange, today) }))
        .into_response()
}

fn exchange_str(exchange: Exchange) -> &'static str {
    match exchange {
        Exchange::Nfo => "NSE",
        Exchange::Mcx => "MCX",
    }
}
