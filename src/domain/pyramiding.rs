//! Per-instrument pyramiding metadata (§3 "Pyramiding State").

use crate::domain::instrument::InstrumentId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct PyramidingState {
    pub instrument: InstrumentId,
    pub last_pyramid_entry_price: Decimal,
    pub base_position_id: String,
    pub updated_at: DateTime<Utc>,
}

impl PyramidingState {
    pub fn new(instrument: InstrumentId, base_position_id: String, entry_price: Decimal) -> Self {
        Self {
            instrument,
            last_pyramid_entry_price: entry_price,
            base_position_id,
            updated_at: Utc::now(),
        }
    }

    pub fn record_pyramid(&mut self, entry_price: Decimal, now: DateTime<Utc>) {
        self.last_pyramid_entry_price = entry_price;
        self.updated_at = now;
    }
}
