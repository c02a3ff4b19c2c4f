//! Position lifecycle (§3 "Position", §3 Lifecycle).

use crate::domain::instrument::InstrumentId;
use crate::domain::signal::Layer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closing,
    Closed,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimiterTag {
    Risk,
    Volatility,
    Margin,
    /// None of the three constraints bound the size; a raw lot count of zero
    /// fell out of `min()` directly rather than being capped by a candidate.
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloverStatus {
    None,
    Pending,
    InProgress,
    Rolled,
    Failed,
}

/// The two leg shapes an executed order can take (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionLegs {
    /// Bank Nifty synthetic long: SELL PE + BUY CE at the same strike/expiry.
    Synthetic {
        sell_pe_symbol: String,
        buy_ce_symbol: String,
        pe_fill_price: Decimal,
        ce_fill_price: Decimal,
        pe_broker_order_id: String,
        ce_broker_order_id: String,
    },
    /// Direct futures (commodity minis).
    Futures {
        symbol: String,
        contract_month: String,
        broker_order_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub instrument: InstrumentId,
    pub layer: Layer,
    pub status: PositionStatus,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_price: Decimal,
    pub lots: Decimal,
    pub quantity: Decimal,
    pub initial_stop: Decimal,
    pub current_stop: Decimal,
    pub highest_close: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub atr_at_entry: Decimal,
    pub limiter: LimiterTag,
    pub is_base_position: bool,
    pub rollover_status: RolloverStatus,
    pub rollover_count: u32,
    pub legs: ExecutionLegs,
    pub strategy_id: String,
    pub exit_timestamp: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,
    pub version: i64,
}

impl Position {
    pub fn make_id(instrument: InstrumentId, layer: Layer) -> String {
        format!("{}_{}", instrument.as_str(), layer.label())
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, PositionStatus::Open | PositionStatus::Partial)
    }

    /// §3 invariant: current stop never decreases for an open long.
    pub fn ratchet_stop(&mut self, proposed: Decimal) {
        if proposed > self.current_stop {
            self.current_stop = proposed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_combines_instrument_and_layer() {
        assert_eq!(
            Position::make_id(InstrumentId::BankNifty, Layer::BASE),
            "BANK_NIFTY_Long_1"
        );
    }

    #[test]
    fn ratchet_stop_never_decreases() {
        let mut pos = sample_position();
        pos.current_stop = rust_decimal_macros::dec!(51650);
        pos.ratchet_stop(rust_decimal_macros::dec!(51600));
        assert_eq!(pos.current_stop, rust_decimal_macros::dec!(51650));

        pos.ratchet_stop(rust_decimal_macros::dec!(51700));
        assert_eq!(pos.current_stop, rust_decimal_macros::dec!(51700));
    }

    fn sample_position() -> Position {
        Position {
            position_id: "BANK_NIFTY_Long_1".to_string(),
            instrument: InstrumentId::BankNifty,
            layer: Layer::BASE,
            status: PositionStatus::Open,
            entry_timestamp: Utc::now(),
            entry_price: rust_decimal_macros::dec!(52000),
            lots: rust_decimal_macros::dec!(4),
            quantity: rust_decimal_macros::dec!(60),
            initial_stop: rust_decimal_macros::dec!(51650),
            current_stop: rust_decimal_macros::dec!(51650),
            highest_close: rust_decimal_macros::dec!(52000),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            atr_at_entry: rust_decimal_macros::dec!(350),
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
}
