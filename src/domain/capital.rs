//! Capital transaction ledger (§3 "Capital Transactions").
//!
//! Invariant: `SUM(amount)` plus the initial offset equals `closed_equity`
//! at every quiescent point (§3, §8).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapitalTransactionType {
    Deposit,
    Withdraw,
    TradingPnl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalTransaction {
    pub id: uuid::Uuid,
    pub tx_type: CapitalTransactionType,
    /// Signed: positive for deposit/profit, negative for withdrawal/loss.
    pub amount: Decimal,
    pub equity_before: Decimal,
    pub equity_after: Decimal,
    pub position_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl CapitalTransaction {
    pub fn trading_pnl(position_id: String, amount: Decimal, equity_before: Decimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            tx_type: CapitalTransactionType::TradingPnl,
            amount,
            equity_before,
            equity_after: equity_before + amount,
            position_id: Some(position_id),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trading_pnl_transaction_computes_equity_after() {
        let tx = CapitalTransaction::trading_pnl("BANK_NIFTY_Long_1".into(), dec!(5000), dec!(5_000_000));
        assert_eq!(tx.equity_after, dec!(5_005_000));
        assert_eq!(tx.tx_type, CapitalTransactionType::TradingPnl);
    }
}
