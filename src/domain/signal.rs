//! Signal parsing and fingerprinting (§3 "Signal", §4.1).

use crate::domain::errors::ValidationError;
use crate::domain::instrument::InstrumentId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    BaseEntry,
    Pyramid,
    Exit,
    EodMonitor,
}

impl SignalKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BASE_ENTRY" => Some(SignalKind::BaseEntry),
            "PYRAMID" => Some(SignalKind::Pyramid),
            "EXIT" => Some(SignalKind::Exit),
            "EOD_MONITOR" => Some(SignalKind::EodMonitor),
            _ => None,
        }
    }
}

/// Long_1 (base) through Long_6 (fifth pyramid layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Layer(pub u8);

impl Layer {
    pub const BASE: Layer = Layer(1);

    pub fn label(&self) -> String {
        format!("Long_{}", self.0)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let n: u8 = s.strip_prefix("Long_")?.parse().ok()?;
        if (1..=6).contains(&n) {
            Some(Layer(n))
        } else {
            None
        }
    }

    pub fn is_base(&self) -> bool {
        self.0 == 1
    }

    pub fn next(&self) -> Layer {
        Layer(self.0 + 1)
    }
}

/// Raw webhook payload, preserved verbatim for audit (§4.1, §9: unknown fields
/// only survive in the raw JSONB of the audit row, never leak into typed code).
pub type RawPayload = serde_json::Value;

#[derive(Debug, Clone)]
pub struct Signal {
    pub kind: SignalKind,
    pub instrument: InstrumentId,
    pub layer: Option<Layer>,
    pub signal_timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub stop: Decimal,
    pub suggested_lots: Option<Decimal>,
    pub atr: Decimal,
    pub er: Option<Decimal>,
    pub supertrend: Option<Decimal>,
    pub roc: Option<Decimal>,
    pub reason: Option<String>,
    pub raw: RawPayload,
}

impl Signal {
    /// Stable fingerprint over (instrument, kind, layer, signal timestamp, coarse
    /// price bucket). Two signals that differ only in sub-second timestamp noise
    /// or sub-tick price collapse onto the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.instrument.as_str().hash(&mut hasher);
        format!("{:?}", self.kind).hash(&mut hasher);
        self.layer.map(|l| l.0).hash(&mut hasher);
        // Coarse to the second: microsecond drift from the signal source should
        // not mint a distinct fingerprint.
        self.signal_timestamp.timestamp().hash(&mut hasher);
        coarse_price_bucket(self.price).hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Buckets price to the nearest 0.05% band so that sub-tick noise in a
/// re-delivered webhook doesn't change the fingerprint.
fn coarse_price_bucket(price: Decimal) -> i64 {
    if price <= Decimal::ZERO {
        return 0;
    }
    let bucket_width = price * rust_decimal_macros::dec!(0.0005);
    if bucket_width <= Decimal::ZERO {
        return 0;
    }
    (price / bucket_width)
        .trunc()
        .to_string()
        .parse::<i64>()
        .unwrap_or(0)
}

/// Parses a raw webhook payload into a `Signal`, per §4.1's parse contract.
pub fn parse_signal(raw: RawPayload, received_at: DateTime<Utc>) -> Result<Signal, ValidationError> {
    let _ = received_at; // freshness is checked by the validator, not at parse time
    let kind_str = raw
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ValidationError::MalformedPayload {
            reason: "missing field: type".to_string(),
        })?;
    let kind = SignalKind::parse(kind_str).ok_or_else(|| ValidationError::MalformedPayload {
        reason: format!("unknown signal kind: {kind_str}"),
    })?;

    let instrument_str =
        raw.get("instrument")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ValidationError::MalformedPayload {
                reason: "missing field: instrument".to_string(),
            })?;
    let instrument =
        InstrumentId::parse(instrument_str).ok_or_else(|| ValidationError::MalformedPayload {
            reason: format!("unknown instrument: {instrument_str}"),
        })?;

    let layer = raw
        .get("position")
        .and_then(|v| v.as_str())
        .and_then(Layer::parse);

    let signal_timestamp = raw
        .get("timestamp")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ValidationError::MalformedPayload {
            reason: "missing field: timestamp".to_string(),
        })
        .and_then(|ts| {
            DateTime::parse_from_rfc3339(ts)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ValidationError::MalformedPayload {
                    reason: format!("unparsable timestamp: {ts}"),
                })
        })?;

    let price = decimal_field(&raw, "price")?;
    if price <= Decimal::ZERO {
        return Err(ValidationError::MalformedPayload {
            reason: "price must be > 0".to_string(),
        });
    }
    let stop = decimal_field(&raw, "stop").unwrap_or(Decimal::ZERO);
    let atr = decimal_field(&raw, "atr").unwrap_or(Decimal::ZERO);

    let reason = raw.get("reason").and_then(|v| v.as_str()).map(String::from);
    if kind == SignalKind::Exit && reason.is_none() {
        return Err(ValidationError::MalformedPayload {
            reason: "reason is required for EXIT signals".to_string(),
        });
    }

    Ok(Signal {
        kind,
        instrument,
        layer,
        signal_timestamp,
        price,
        stop,
        suggested_lots: decimal_field(&raw, "suggested_lots").ok(),
        atr,
        er: decimal_field(&raw, "er").ok(),
        supertrend: decimal_field(&raw, "supertrend").ok(),
        roc: decimal_field(&raw, "roc").ok(),
        reason,
        raw,
    })
}

fn decimal_field(raw: &RawPayload, field: &str) -> Result<Decimal, ValidationError> {
    raw.get(field)
        .and_then(|v| v.as_f64())
        .and_then(Decimal::from_f64_retain)
        .ok_or_else(|| ValidationError::MalformedPayload {
            reason: format!("missing or invalid field: {field}"),
        })
}

use rust_decimal::prelude::FromPrimitive;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> RawPayload {
        json!({
            "type": "BASE_ENTRY",
            "instrument": "BANK_NIFTY",
            "position": "Long_1",
            "price": 52000.0,
            "stop": 51800.0,
            "suggested_lots": 4,
            "atr": 350.0,
            "er": 0.6,
            "supertrend": 51700.0,
            "timestamp": "2026-07-28T09:20:00Z",
        })
    }

    #[test]
    fn parses_valid_base_entry() {
        let signal = parse_signal(sample_payload(), Utc::now()).unwrap();
        assert_eq!(signal.kind, SignalKind::BaseEntry);
        assert_eq!(signal.instrument, InstrumentId::BankNifty);
        assert_eq!(signal.layer, Some(Layer::BASE));
    }

    #[test]
    fn rejects_missing_reason_for_exit() {
        let mut payload = sample_payload();
        payload["type"] = json!("EXIT");
        let err = parse_signal(payload, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn rejects_zero_price() {
        let mut payload = sample_payload();
        payload["price"] = json!(0);
        assert!(parse_signal(payload, Utc::now()).is_err());
    }

    #[test]
    fn rejects_unparsable_timestamp() {
        let mut payload = sample_payload();
        payload["timestamp"] = json!("not-a-date");
        assert!(parse_signal(payload, Utc::now()).is_err());
    }

    #[test]
    fn fingerprint_is_stable_for_identical_inputs() {
        let s1 = parse_signal(sample_payload(), Utc::now()).unwrap();
        let s2 = parse_signal(sample_payload(), Utc::now()).unwrap();
        assert_eq!(s1.fingerprint(), s2.fingerprint());
    }

    #[test]
    fn fingerprint_differs_on_layer() {
        let s1 = parse_signal(sample_payload(), Utc::now()).unwrap();
        let mut payload2 = sample_payload();
        payload2["position"] = json!("Long_2");
        payload2["type"] = json!("PYRAMID");
        let s2 = parse_signal(payload2, Utc::now()).unwrap();
        assert_ne!(s1.fingerprint(), s2.fingerprint());
    }

    #[test]
    fn layer_label_and_parse_round_trip() {
        for n in 1..=6u8 {
            let layer = Layer(n);
            assert_eq!(Layer::parse(&layer.label()), Some(layer));
        }
        assert_eq!(Layer::parse("Long_7"), None);
        assert_eq!(Layer::parse("Long_0"), None);
    }
}
