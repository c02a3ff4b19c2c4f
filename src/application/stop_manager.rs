//! ATR stop initialization and trailing ratchet (§4.5).
//!
//! Generalizes `Zuytan-rustrade`'s `StopState` state machine
//! (`application/risk_management/trailing_stops.rs`) from a single
//! in-memory position to the persisted `Position` row this spec requires:
//! the ratchet itself is the same `max(current, proposed)` rule, but it
//! operates on `Position::current_stop` directly rather than an isolated
//! enum, and a breach is reported as an event rather than a state
//! transition (the `open -> closing -> closed` transition belongs to the
//! executor, not the stop manager).

use crate::domain::instrument::Instrument;
use crate::domain::position::Position;
use rust_decimal::Decimal;

/// Emitted when live price breaches the current stop; the caller (engine)
/// turns this into an internal EXIT signal with reason `STOP_LOSS`.
#[derive(Debug, Clone, PartialEq)]
pub struct StopBreach {
    pub position_id: String,
    pub current_stop: Decimal,
    pub live_price: Decimal,
}

pub struct StopManager;

impl StopManager {
    /// §4.5 "On entry": `initial_stop = entry_price - initial_atr_mult * ATR`.
    pub fn initial_stop(instrument: &Instrument, entry_price: Decimal, atr: Decimal) -> Decimal {
        entry_price - instrument.initial_atr_mult * atr
    }

    /// §4.5 "Per observation of a close": raises `highest_close`, proposes a
    /// new stop from it, and ratchets `current_stop` up only — it never
    /// moves down even if the proposed value is lower than the existing one.
    pub fn observe_close(position: &mut Position, instrument: &Instrument, close: Decimal, atr: Decimal) {
        if close > position.highest_close {
            position.highest_close = close;
        }
        let proposed = position.highest_close - instrument.trailing_atr_mult * atr;
        position.ratchet_stop(proposed);
    }

    /// §4.5 "Stop hit": live price at or below the current stop. Exactly
    /// equal counts as a breach (§7 edge case).
    pub fn check_breach(position: &Position, live_price: Decimal) -> Option<StopBreach> {
        if live_price <= position.current_stop {
            Some(StopBreach {
                position_id: position.position_id.clone(),
                current_stop: position.current_stop,
                live_price,
            })
        } else {
            None
        }
    }
}
