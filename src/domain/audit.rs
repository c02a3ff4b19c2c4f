//! Signal audit trail and order execution log (§3 "Signal Log / Audit",
//! "Order Execution Log").

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Processed,
    RejectedValidation,
    RejectedRisk,
    RejectedDuplicate,
    RejectedMarket,
    RejectedManual,
    FailedOrder,
    PartialFill,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalAudit {
    pub id: uuid::Uuid,
    pub fingerprint: String,
    pub outcome: AuditOutcome,
    pub reason: Option<String>,
    pub rejection_code: Option<String>,
    pub validation_json: Option<serde_json::Value>,
    pub sizing_json: Option<serde_json::Value>,
    pub risk_json: Option<serde_json::Value>,
    pub execution_json: Option<serde_json::Value>,
    pub payload: serde_json::Value,
    pub processing_duration_ms: i64,
    pub instance_id: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct AuditBuilder {
    pub outcome: Option<AuditOutcome>,
    pub reason: Option<String>,
    pub rejection_code: Option<String>,
    pub validation_json: Option<serde_json::Value>,
    pub sizing_json: Option<serde_json::Value>,
    pub risk_json: Option<serde_json::Value>,
    pub execution_json: Option<serde_json::Value>,
}

impl AuditBuilder {
    pub fn build(
        self,
        fingerprint: String,
        payload: serde_json::Value,
        processing_duration_ms: i64,
        instance_id: String,
    ) -> SignalAudit {
        SignalAudit {
            id: uuid::Uuid::new_v4(),
            fingerprint,
            outcome: self.outcome.unwrap_or(AuditOutcome::Processed),
            reason: self.reason,
            rejection_code: self.rejection_code,
            validation_json: self.validation_json,
            sizing_json: self.sizing_json,
            risk_json: self.risk_json,
            execution_json: self.execution_json,
            payload,
            processing_duration_ms,
            instance_id,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderExecutionStatus {
    Filled,
    PartialFill,
    Rejected,
    Cancelled,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExecutionLogEntry {
    pub order_id: String,
    pub parent_order_id: Option<String>,
    pub position_id: String,
    pub symbol: String,
    pub action: String,
    pub requested_quantity: Decimal,
    pub filled_quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub fill_price: Option<Decimal>,
    pub slippage_pct: Option<Decimal>,
    pub status: OrderExecutionStatus,
    pub placed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: i64,
}
