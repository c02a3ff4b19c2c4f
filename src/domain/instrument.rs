//! Static per-instrument configuration (§3 "Instrument").
//!
//! Instruments are a fixed option set — four are supported and the table is
//! built once in-process rather than loaded from the database, matching the
//! "fixed option set; all changes require restart" posture of §6.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentId {
    BankNifty,
    GoldMini,
    SilverMini,
    Copper,
}

impl InstrumentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentId::BankNifty => "BANK_NIFTY",
            InstrumentId::GoldMini => "GOLD_MINI",
            InstrumentId::SilverMini => "SILVER_MINI",
            InstrumentId::Copper => "COPPER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BANK_NIFTY" => Some(InstrumentId::BankNifty),
            "GOLD_MINI" => Some(InstrumentId::GoldMini),
            "SILVER_MINI" => Some(InstrumentId::SilverMini),
            "COPPER" => Some(InstrumentId::Copper),
            _ => None,
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Nfo,
    Mcx,
}

/// Contract-month selection rule for a commodity/index instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractMonthRule {
    /// Weekly expiries that roll into the last weekly of the month (Bank Nifty synthetic).
    MonthlyWeekly,
    /// Only these calendar months carry a tradeable contract. Silver Mini's cycle
    /// (Feb/Apr/Jun/Aug/Nov) deviates from the standard MCX monthly cadence; see DESIGN.md.
    FixedMonths(&'static [u32]),
    /// Every calendar month.
    EveryMonth,
}

#[derive(Debug, Clone)]
pub struct Instrument {
    pub id: InstrumentId,
    pub exchange: Exchange,
    /// Contracts per lot.
    pub lot_size: Decimal,
    /// Currency per 1-point move per lot.
    pub point_value: Decimal,
    pub margin_per_lot: Decimal,
    pub initial_risk_pct: Decimal,
    pub ongoing_risk_pct: Decimal,
    pub initial_vol_pct: Decimal,
    pub ongoing_vol_pct: Decimal,
    pub initial_atr_mult: Decimal,
    pub trailing_atr_mult: Decimal,
    pub max_pyramids: u32,
    pub rollover_lookahead_days: i64,
    pub contract_month_rule: ContractMonthRule,
    pub strike_interval: Decimal,
    pub eod_enabled: bool,
}

impl Instrument {
    pub fn catalog() -> HashMap<InstrumentId, Instrument> {
        let mut m = HashMap::new();

        m.insert(
            InstrumentId::BankNifty,
            Instrument {
                id: InstrumentId::BankNifty,
                exchange: Exchange::Nfo,
                lot_size: dec!(15),
                point_value: dec!(30),
                margin_per_lot: dec!(150_000),
                initial_risk_pct: dec!(0.005),
                ongoing_risk_pct: dec!(0.0025),
                initial_vol_pct: dec!(0.01),
                ongoing_vol_pct: dec!(0.005),
                initial_atr_mult: dec!(1.0),
                trailing_atr_mult: dec!(1.0),
                max_pyramids: 5,
                rollover_lookahead_days: 2,
                contract_month_rule: ContractMonthRule::MonthlyWeekly,
                strike_interval: dec!(100),
                eod_enabled: true,
            },
        );

        m.insert(
            InstrumentId::GoldMini,
            Instrument {
                id: InstrumentId::GoldMini,
                exchange: Exchange::Mcx,
                lot_size: dec!(10),
                point_value: dec!(10),
                margin_per_lot: dec!(60_000),
                initial_risk_pct: dec!(0.01),
                ongoing_risk_pct: dec!(0.005),
                initial_vol_pct: dec!(0.015),
                ongoing_vol_pct: dec!(0.0075),
                initial_atr_mult: dec!(2.0),
                trailing_atr_mult: dec!(1.5),
                max_pyramids: 5,
                rollover_lookahead_days: 8,
                contract_month_rule: ContractMonthRule::EveryMonth,
                strike_interval: dec!(0),
                eod_enabled: true,
            },
        );

        m.insert(
            InstrumentId::SilverMini,
            Instrument {
                id: InstrumentId::SilverMini,
                exchange: Exchange::Mcx,
                lot_size: dec!(5),
                point_value: dec!(5),
                margin_per_lot: dec!(70_000),
                initial_risk_pct: dec!(0.01),
                ongoing_risk_pct: dec!(0.005),
                initial_vol_pct: dec!(0.015),
                ongoing_vol_pct: dec!(0.0075),
                initial_atr_mult: dec!(2.0),
                trailing_atr_mult: dec!(1.5),
                max_pyramids: 5,
                rollover_lookahead_days: 8,
                // Feb/Apr/Jun/Aug/Nov only; deviates from the standard MCX monthly cadence.
                contract_month_rule: ContractMonthRule::FixedMonths(&[2, 4, 6, 8, 11]),
                strike_interval: dec!(0),
                eod_enabled: true,
            },
        );

        m.insert(
            InstrumentId::Copper,
            Instrument {
                id: InstrumentId::Copper,
                exchange: Exchange::Mcx,
                lot_size: dec!(1000),
                point_value: dec!(1),
                margin_per_lot: dec!(90_000),
                initial_risk_pct: dec!(0.01),
                ongoing_risk_pct: dec!(0.005),
                initial_vol_pct: dec!(0.015),
                ongoing_vol_pct: dec!(0.0075),
                initial_atr_mult: dec!(2.0),
                trailing_atr_mult: dec!(1.5),
                max_pyramids: 5,
                rollover_lookahead_days: 8,
                contract_month_rule: ContractMonthRule::EveryMonth,
                strike_interval: dec!(0),
                eod_enabled: true,
            },
        );

        m
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.id, InstrumentId::BankNifty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_contains_all_four_instruments() {
        let catalog = Instrument::catalog();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.contains_key(&InstrumentId::BankNifty));
        assert!(catalog.contains_key(&InstrumentId::Copper));
    }

    #[test]
    fn bank_nifty_is_synthetic_others_are_not() {
        let catalog = Instrument::catalog();
        assert!(catalog[&InstrumentId::BankNifty].is_synthetic());
        assert!(!catalog[&InstrumentId::GoldMini].is_synthetic());
    }

    #[test]
    fn instrument_id_round_trips_through_parse() {
        for id in [
            InstrumentId::BankNifty,
            InstrumentId::GoldMini,
            InstrumentId::SilverMini,
            InstrumentId::Copper,
        ] {
            assert_eq!(InstrumentId::parse(id.as_str()), Some(id));
        }
        assert_eq!(InstrumentId::parse("NOT_REAL"), None);
    }
}
