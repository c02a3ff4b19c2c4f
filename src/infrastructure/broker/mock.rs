//! In-memory `BrokerPort` for scenario tests and local development, modeled
//! on `Zuytan-rustrade`'s `MockExecService`
//! (`application/agents/executor.rs` test module): every call succeeds
//! trivially, fills happen immediately at the requested price.

use crate::domain::ports::{
    BrokerOrderState, BrokerOrderStatus, BrokerPort, BrokerPosition, MarginSnapshot, OrderRequest, Quote,
};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct MockBroker {
    next_id: AtomicU64,
    orders: Mutex<std::collections::HashMap<String, BrokerOrderState>>,
    fixed_quote: Decimal,
}

impl MockBroker {
    pub fn new(fixed_quote: Decimal) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            orders: Mutex::new(std::collections::HashMap::new()),
            fixed_quote,
        }
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new(dec!(100))
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn place_order(&self, order: OrderRequest) -> Result<String> {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let fill_price = order.limit_price.unwrap_or(self.fixed_quote);
        self.orders.lock().unwrap().insert(
            id.clone(),
            BrokerOrderState {
                broker_order_id: id.clone(),
                status: BrokerOrderStatus::Filled,
                filled_quantity: order.quantity,
                average_fill_price: Some(fill_price),
            },
        );
        Ok(id)
    }

    async fn modify_order(&self, _broker_order_id: &str, _new_limit_price: Decimal) -> Result<()> {
        Ok(())
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<()> {
        if let Some(state) = self.orders.lock().unwrap().get_mut(broker_order_id) {
            state.status = BrokerOrderStatus::Cancelled;
        }
        Ok(())
    }

    async fn get_order_status(&self, broker_order_id: &str) -> Result<BrokerOrderState> {
        self.orders
            .lock()
            .unwrap()
            .get(broker_order_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown mock order {broker_order_id}"))
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>> {
        Ok(Vec::new())
    }

    async fn get_margins(&self) -> Result<MarginSnapshot> {
        Ok(MarginSnapshot {
            available_margin: dec!(10_000_000),
            used_margin: Decimal::ZERO,
        })
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        Ok(Quote {
            symbol: symbol.to_string(),
            last_price: self.fixed_quote,
            close_price: self.fixed_quote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::OrderAction;

    #[tokio::test]
    async fn place_order_fills_immediately_at_limit_price() {
        let broker = MockBroker::new(dec!(52000));
        let id = broker
            .place_order(OrderRequest {
                symbol: "BANKNIFTY-FUT".to_string(),
                action: OrderAction::Buy,
                quantity: dec!(60),
                limit_price: Some(dec!(52010)),
                tag: "base_entry".to_string(),
            })
            .await
            .unwrap();
        let state = broker.get_order_status(&id).await.unwrap();
        assert_eq!(state.status, BrokerOrderStatus::Filled);
        assert_eq!(state.average_fill_price, Some(dec!(52010)));
    }
}
