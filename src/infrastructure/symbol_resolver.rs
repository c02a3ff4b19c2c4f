//! Maps a logical `(instrument, contract month / strike)` to the
//! exchange-specific symbol string the broker expects (§6 "Broker port":
//! "Adapters map logical symbols to exchange-specific strings, e.g.
//! `BANKNIFTY{yymmdd}{strike}{CE|PE}`, `GOLDM{yyMMMdd}FUT`").

use crate::domain::instrument::{Exchange, InstrumentId};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub struct SymbolResolver;

impl SymbolResolver {
    /// Weekly/monthly option symbol for the Bank Nifty synthetic leg.
    pub fn option_symbol(expiry: NaiveDate, strike: Decimal, is_call: bool) -> String {
        format!(
            "BANKNIFTY{}{}{}",
            expiry.format("%y%m%d"),
            strike.trunc(),
            if is_call { "CE" } else { "PE" }
        )
    }

    /// Futures symbol for the commodity minis, e.g. `GOLDM26AUGFUT`.
    pub fn futures_symbol(instrument: InstrumentId, contract_month: NaiveDate) -> String {
        let root = match instrument {
            InstrumentId::GoldMini => "GOLDM",
            InstrumentId::SilverMini => "SILVERM",
            InstrumentId::Copper => "COPPER",
            InstrumentId::BankNifty => "BANKNIFTY",
        };
        format!("{root}{}FUT", contract_month.format("%y%b").to_uppercase())
    }

    pub fn exchange(instrument: InstrumentId) -> Exchange {
        match instrument {
            InstrumentId::BankNifty => Exchange::Nfo,
            InstrumentId::GoldMini | InstrumentId::SilverMini | InstrumentId::Copper => Exchange::Mcx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn option_symbol_formats_strike_and_side() {
        let expiry = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        assert_eq!(
            SymbolResolver::option_symbol(expiry, dec!(52000), true),
            "BANKNIFTY26082752000CE"
        );
        assert_eq!(
            SymbolResolver::option_symbol(expiry, dec!(52000), false),
            "BANKNIFTY26082752000PE"
        );
    }

    #[test]
    fn futures_symbol_uses_instrument_root() {
        let month = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(SymbolResolver::futures_symbol(InstrumentId::GoldMini, month), "GOLDM26AUGFUT");
    }

    #[test]
    fn exchange_routes_bank_nifty_to_nfo() {
        assert_eq!(SymbolResolver::exchange(InstrumentId::BankNifty), Exchange::Nfo);
        assert_eq!(SymbolResolver::exchange(InstrumentId::Copper), Exchange::Mcx);
    }
}
