//! Signal validation: freshness, price divergence, and the pyramid 1R gate
//! (§4.2).

use crate::config::EodEnvConfig;
use crate::domain::errors::ValidationError;
use crate::domain::position::Position;
use crate::domain::signal::{Signal, SignalKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// BASE_ENTRY tolerates wider divergence from live price than PYRAMID/EXIT,
/// which must track the signal closely since a base position already
/// anchors the trade.
const BASE_ENTRY_DIVERGENCE_PCT: Decimal = dec!(2);
const TIGHT_DIVERGENCE_PCT: Decimal = dec!(1);

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub age_secs: i64,
    pub divergence_pct: Decimal,
    pub divergence_threshold_pct: Decimal,
    pub warning: Option<String>,
}

pub struct SignalValidator;

impl SignalValidator {
    /// §4.2 "Condition validation" (i): freshness.
    pub fn check_freshness(
        signal: &Signal,
        received_at: DateTime<Utc>,
        eod: &EodEnvConfig,
    ) -> Result<i64, ValidationError> {
        if signal.signal_timestamp > received_at {
            return Err(ValidationError::FutureTimestamp {
                signal_ts: signal.signal_timestamp,
                received_at,
            });
        }
        let age_secs = (received_at - signal.signal_timestamp).num_seconds();
        if age_secs > eod.max_signal_age_seconds {
            return Err(ValidationError::Stale {
                age_secs,
                max_age_secs: eod.max_signal_age_seconds,
            });
        }
        Ok(age_secs)
    }

    /// §4.2 "Condition validation" (ii), PYRAMID only: price must have moved
    /// at least 1R (one unit of initial risk per lot) from the base entry.
    pub fn check_1r_gate(signal: &Signal, base: &Position) -> Result<(), ValidationError> {
        let one_r = base.entry_price - base.initial_stop;
        if signal.price - base.entry_price < one_r {
            return Err(ValidationError::RiskIncreaseBlocked);
        }
        Ok(())
    }

    /// §4.2 "Execution validation": direction-aware divergence between
    /// signal price and live LTP. Unfavorable divergence beyond threshold
    /// rejects; favorable divergence beyond threshold only warns.
    pub fn check_divergence(signal: &Signal, ltp: Decimal) -> Result<ValidationReport, ValidationError> {
        let threshold = match signal.kind {
            SignalKind::BaseEntry => BASE_ENTRY_DIVERGENCE_PCT,
            _ => TIGHT_DIVERGENCE_PCT,
        };
        let divergence_pct = ((ltp - signal.price) / signal.price * dec!(100)).abs();

        if divergence_pct <= threshold {
            return Ok(ValidationReport {
                age_secs: 0,
                divergence_pct,
                divergence_threshold_pct: threshold,
                warning: None,
            });
        }

        // Unfavorable: live price has moved against the long beyond the
        // signal's expectation (lower than signal price for entries).
        let unfavorable = ltp < signal.price;
        if unfavorable {
            return Err(ValidationError::PriceDivergent {
                symbol: signal.instrument.as_str().to_string(),
                divergence_pct,
                threshold_pct: threshold,
            });
        }

        Ok(ValidationReport {
            age_secs: 0,
            divergence_pct,
            divergence_threshold_pct: threshold,
            warning: Some(format!(
                "favorable divergence {divergence_pct:.4}% exceeds threshold {threshold:.4}%, proceeding"
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instrument::InstrumentId;
    use crate::domain::position::{ExecutionLegs, LimiterTag, PositionStatus, RolloverStatus};
    use crate::domain::signal::Layer;
    use chrono::Duration;

    fn base_signal(kind: SignalKind, price: Decimal, ts: DateTime<Utc>) -> Signal {
        Signal {
            kind,
            instrument: InstrumentId::BankNifty,
            layer: Some(Layer::BASE),
            signal_timestamp: ts,
            price,
            stop: dec!(51800),
            suggested_lots: None,
            atr: dec!(350),
            er: None,
            supertrend: None,
            roc: None,
            reason: if kind == SignalKind::Exit { Some("manual".into()) } else { None },
            raw: serde_json::json!({}),
        }
    }

    fn eod() -> EodEnvConfig {
        EodEnvConfig {
            enabled: true,
            monitoring_start_minutes: 20,
            condition_check_seconds: 15,
            execution_seconds: 25,
            tracking_seconds: 60,
            order_timeout_seconds: 20,
            limit_buffer_pct: dec!(0.1),
            fallback_to_market: true,
            max_signal_age_seconds: 30,
        }
    }

    #[test]
    fn exactly_at_max_age_is_accepted() {
        let now = Utc::now();
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), now - Duration::seconds(30));
        assert!(SignalValidator::check_freshness(&signal, now, &eod()).is_ok());
    }

    #[test]
    fn one_second_beyond_max_age_is_rejected() {
        let now = Utc::now();
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), now - Duration::seconds(31));
        let err = SignalValidator::check_freshness(&signal, now, &eod()).unwrap_err();
        assert_eq!(err.code(), "SIGNAL_STALE");
    }

    #[test]
    fn future_timestamp_is_rejected() {
        let now = Utc::now();
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), now + Duration::seconds(5));
        assert!(matches!(
            SignalValidator::check_freshness(&signal, now, &eod()),
            Err(ValidationError::FutureTimestamp { .. })
        ));
    }

    #[test]
    fn divergence_exactly_at_threshold_is_accepted() {
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), Utc::now());
        // 2% of 52000 = 1040; ltp = 53040 -> exactly 2% above.
        let report = SignalValidator::check_divergence(&signal, dec!(53040)).unwrap();
        assert_eq!(report.divergence_pct, dec!(2));
    }

    #[test]
    fn unfavorable_divergence_beyond_threshold_rejects() {
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), Utc::now());
        let err = SignalValidator::check_divergence(&signal, dec!(50000)).unwrap_err();
        assert_eq!(err.code(), "PRICE_DIVERGENT");
    }

    #[test]
    fn favorable_divergence_beyond_threshold_warns_but_proceeds() {
        let signal = base_signal(SignalKind::BaseEntry, dec!(52000), Utc::now());
        let report = SignalValidator::check_divergence(&signal, dec!(54000)).unwrap();
        assert!(report.warning.is_some());
    }

    fn sample_base_position() -> Position {
        Position {
            position_id: "BANK_NIFTY_Long_1".to_string(),
            instrument: InstrumentId::BankNifty,
            layer: Layer::BASE,
            status: PositionStatus::Open,
            entry_timestamp: Utc::now(),
            entry_price: dec!(52000),
            lots: dec!(4),
            quantity: dec!(60),
            initial_stop: dec!(51800),
            current_stop: dec!(51800),
            highest_close: dec!(52000),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            atr_at_entry: dec!(350),
            limiter: LimiterTag::Risk,
            is_base_position: true,
            rollover_status: RolloverStatus::None,
            rollover_count: 0,
            legs: ExecutionLegs::Futures {
                symbol: "BANKNIFTY-FUT".to_string(),
                contract_month: "2026-08".to_string(),
                broker_order_id: "ord-1".to_string(),
            },
            strategy_id: "trend-v1".to_string(),
            exit_timestamp: None,
            exit_price: None,
            exit_reason: None,
            version: 0,
        }
    }

    #[test]
    fn pyramid_blocked_when_price_has_not_moved_1r() {
        let base = sample_base_position(); // 1R = 52000 - 51800 = 200
        let signal = base_signal(SignalKind::Pyramid, dec!(52100), Utc::now());
        assert!(SignalValidator::check_1r_gate(&signal, &base).is_err());
    }

    #[test]
    fn pyramid_accepted_when_price_moved_1r() {
        let base = sample_base_position();
        let signal = base_signal(SignalKind::Pyramid, dec!(52200), Utc::now());
        assert!(SignalValidator::check_1r_gate(&signal, &base).is_ok());
    }
}
