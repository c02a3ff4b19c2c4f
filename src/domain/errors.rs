use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by the signal validator (§4.2 / §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("signal timestamp {signal_ts} is in the future (received at {received_at})")]
    FutureTimestamp {
        signal_ts: DateTime<Utc>,
        received_at: DateTime<Utc>,
    },

    #[error("signal is stale: age {age_secs}s > max {max_age_secs}s")]
    Stale { age_secs: i64, max_age_secs: i64 },

    #[error("price divergence {divergence_pct:.4}% exceeds threshold {threshold_pct:.4}% for {symbol}")]
    PriceDivergent {
        symbol: String,
        divergence_pct: Decimal,
        threshold_pct: Decimal,
    },

    #[error("pyramid 1R gate blocked: price has not moved 1R from base entry")]
    RiskIncreaseBlocked,

    #[error("no open base position for instrument {instrument}")]
    MissingBase { instrument: String },

    #[error("invalid payload: {reason}")]
    MalformedPayload { reason: String },
}

impl ValidationError {
    /// Stable machine-readable code used in `signal_audit.rejection_code`.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::FutureTimestamp { .. } => "SIGNAL_FUTURE",
            ValidationError::Stale { .. } => "SIGNAL_STALE",
            ValidationError::PriceDivergent { .. } => "PRICE_DIVERGENT",
            ValidationError::RiskIncreaseBlocked => "RISK_INCREASE_BLOCKED",
            ValidationError::MissingBase { .. } => "MISSING_BASE",
            ValidationError::MalformedPayload { .. } => "MALFORMED_PAYLOAD",
        }
    }
}

/// Errors raised by risk/sizing/pyramid-gate checks (§4.3 / §4.4 / §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RiskError {
    #[error("portfolio risk cap exceeded: {current_pct:.2}% >= {cap_pct:.2}%")]
    PortfolioRiskCap {
        current_pct: Decimal,
        cap_pct: Decimal,
    },

    #[error("pyramid blocked: portfolio risk gate: {current_pct:.2}% >= {block_pct:.2}%")]
    PortfolioGateRiskBlock {
        current_pct: Decimal,
        block_pct: Decimal,
    },

    #[error("pyramid blocked: portfolio volatility gate: {current_pct:.2}% >= {block_pct:.2}%")]
    PortfolioGateVolBlock {
        current_pct: Decimal,
        block_pct: Decimal,
    },

    #[error("pyramid blocked: margin utilization gate: {current_pct:.2}% >= {block_pct:.2}%")]
    PortfolioGateMarginBlock {
        current_pct: Decimal,
        block_pct: Decimal,
    },

    #[error("pyramid blocked: max pyramids ({max_pyramids}) reached for {instrument}")]
    MaxPyramidsReached {
        instrument: String,
        max_pyramids: u32,
    },

    #[error("pyramid blocked: price has not moved {required_move} from last pyramid entry")]
    PyramidSpacingNotMet { required_move: Decimal },

    #[error("pyramid blocked: profit gate not satisfied (combined_unrealized={combined}, instrument_unrealized={instrument_unrealized}, base_risk={base_risk})")]
    ProfitGateNotMet {
        combined: Decimal,
        instrument_unrealized: Decimal,
        base_risk: Decimal,
    },

    #[error("insufficient margin: need {need}, headroom {available}")]
    InsufficientMargin { need: Decimal, available: Decimal },
}

impl RiskError {
    pub fn code(&self) -> &'static str {
        match self {
            RiskError::PortfolioRiskCap { .. } => "PORTFOLIO_RISK_CAP",
            RiskError::PortfolioGateRiskBlock { .. } => "PORTFOLIO_GATE_RISK_BLOCK",
            RiskError::PortfolioGateVolBlock { .. } => "PORTFOLIO_GATE_VOL_BLOCK",
            RiskError::PortfolioGateMarginBlock { .. } => "PORTFOLIO_GATE_MARGIN_BLOCK",
            RiskError::MaxPyramidsReached { .. } => "MAX_PYRAMIDS_REACHED",
            RiskError::PyramidSpacingNotMet { .. } => "PYRAMID_SPACING_NOT_MET",
            RiskError::ProfitGateNotMet { .. } => "PROFIT_GATE_NOT_MET",
            RiskError::InsufficientMargin { .. } => "INSUFFICIENT_MARGIN",
        }
    }
}

/// Optimistic-locking conflict on a versioned row (§4.7 / §5).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("version conflict on {table} id={id}: expected v{expected}, found v{actual}")]
pub struct StateConflictError {
    pub table: &'static str,
    pub id: String,
    pub expected: i64,
    pub actual: i64,
}

/// Errors from the broker port (§6 / §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("order rejected by broker: {reason}")]
    Rejected { reason: String },

    #[error("broker call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("broker network error: {reason}")]
    Network { reason: String },

    #[error("leg {symbol} failed after retries: {reason}")]
    LegFailed { symbol: String, reason: String },
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Raised when a non-leader instance attempts a write operation (§4.8 / §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("this instance is not the elected leader")]
pub struct LeadershipError;

/// Raised when a signal arrives outside market hours or on a holiday (§4.7).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("market closed: {reason}")]
pub struct MarketClosed {
    pub reason: String,
}

/// Raised when a signal's fingerprint has already been accepted (§4.1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("duplicate signal: fingerprint {fingerprint} already processed")]
pub struct Duplicate {
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn validation_error_codes_are_stable() {
        let e = ValidationError::Stale {
            age_secs: 45,
            max_age_secs: 30,
        };
        assert_eq!(e.code(), "SIGNAL_STALE");
        assert!(e.to_string().contains("45"));
    }

    #[test]
    fn risk_error_formats_percentages() {
        let e = RiskError::PortfolioGateRiskBlock {
            current_pct: dec!(12.3),
            block_pct: dec!(12),
        };
        assert_eq!(e.code(), "PORTFOLIO_GATE_RISK_BLOCK");
        let msg = e.to_string();
        assert!(msg.contains("12.30"));
    }

    #[test]
    fn state_conflict_error_formatting() {
        let e = StateConflictError {
            table: "portfolio_positions",
            id: "BANK_NIFTY_Long_1".to_string(),
            expected: 3,
            actual: 4,
        };
        let msg = e.to_string();
        assert!(msg.contains("v3"));
        assert!(msg.contains("v4"));
    }
}
