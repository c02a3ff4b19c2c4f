//! Order execution: simple-limit and progressive strategies, synthetic
//! multi-leg orders for Bank Nifty, single-leg futures for the commodity
//! minis (§4.6).

use crate::config::{ExecutionEnvConfig, ExecutionStrategy};
use crate::domain::audit::{OrderExecutionLogEntry, OrderExecutionStatus};
use crate::domain::errors::BrokerError;
use crate::domain::ports::{BrokerOrderStatus, BrokerPort, OrderAction, OrderRequest};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// One side of an order: for Bank Nifty, two of these are submitted
/// (SELL PE + BUY CE); for commodity minis, exactly one.
#[derive(Debug, Clone)]
pub struct LegRequest {
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: Decimal,
    pub signal_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct LegResult {
    pub symbol: String,
    pub broker_order_id: String,
    pub fill_price: Decimal,
    pub filled_quantity: Decimal,
    pub requested_quantity: Decimal,
    pub status: OrderExecutionStatus,
}

impl LegResult {
    pub fn slippage_pct(&self, signal_price: Decimal) -> Decimal {
        if signal_price == Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.fill_price - signal_price) / signal_price * dec!(100)).abs()
    }

    pub fn to_log_entry(&self, position_id: &str, action: OrderAction, placed_at: chrono::DateTime<Utc>, duration_ms: i64, signal_price: Decimal) -> OrderExecutionLogEntry {
        OrderExecutionLogEntry {
            order_id: self.broker_order_id.clone(),
            parent_order_id: None,
            position_id: position_id.to_string(),
            symbol: self.symbol.clone(),
            action: format!("{action:?}"),
            requested_quantity: self.requested_quantity,
            filled_quantity: self.filled_quantity,
            limit_price: None,
            fill_price: Some(self.fill_price),
            slippage_pct: Some(self.slippage_pct(signal_price)),
            status: self.status,
            placed_at,
            completed_at: Some(Utc::now()),
            duration_ms,
        }
    }
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Filled(Vec<LegResult>),
    PartialFill(Vec<LegResult>),
    Failed { reason: String, cancelled_legs: Vec<String> },
}

pub struct OrderExecutor {
    broker: Arc<dyn BrokerPort>,
    config: ExecutionEnvConfig,
}

impl OrderExecutor {
    pub fn new(broker: Arc<dyn BrokerPort>, config: ExecutionEnvConfig) -> Self {
        Self { broker, config }
    }

    /// Live quote passthrough, used by the EOD monitor to price open
    /// positions against the broker's last traded price.
    pub async fn quote(&self, symbol: &str) -> anyhow::Result<crate::domain::ports::Quote> {
        self.broker.get_quote(symbol).await
    }

    /// Submits every leg, in order. If any leg fails, already-filled legs
    /// are cancelled and the whole order reports `FAILED_ORDER` (§4.6: "if
    /// either leg fails after retry, the executor cancels the other leg").
    pub async fn execute(&self, legs: &[LegRequest]) -> ExecutionOutcome {
        let mut filled = Vec::new();
        for leg in legs {
            match self.execute_leg(leg).await {
                Ok(result) => filled.push(result),
                Err(err) => {
                    error!(symbol = %leg.symbol, error = %err, "leg execution failed, cancelling filled legs");
                    let mut cancelled = Vec::new();
                    for done in &filled {
                        if self.broker.cancel_order(&done.broker_order_id).await.is_ok() {
                            cancelled.push(done.broker_order_id.clone());
                        }
                    }
                    return ExecutionOutcome::Failed {
                        reason: err.to_string(),
                        cancelled_legs: cancelled,
                    };
                }
            }
        }

        let any_partial = filled.iter().any(|l| l.status == OrderExecutionStatus::PartialFill);
        if any_partial {
            ExecutionOutcome::PartialFill(filled)
        } else {
            ExecutionOutcome::Filled(filled)
        }
    }

    async fn execute_leg(&self, leg: &LegRequest) -> Result<LegResult, BrokerError> {
        match self.config.strategy {
            ExecutionStrategy::SimpleLimit => self.execute_simple_limit(leg).await,
            ExecutionStrategy::Progressive => self.execute_progressive(leg).await,
        }
    }

    /// §4.6 "Simple limit": place at signal price, wait, fall back to
    /// MARKET on timeout.
    async fn execute_simple_limit(&self, leg: &LegRequest) -> Result<LegResult, BrokerError> {
        let order_id = self.place(leg, Some(leg.signal_price)).await?;
        let state = self
            .broker
            .get_order_status(&order_id)
            .await
            .map_err(|e| BrokerError::Network { reason: e.to_string() })?;

        if state.status == BrokerOrderStatus::Filled {
            return Ok(self.leg_result(leg, &order_id, state.average_fill_price.unwrap_or(leg.signal_price), state.filled_quantity, OrderExecutionStatus::Filled));
        }

        warn!(symbol = %leg.symbol, "simple-limit leg unfilled, converting to MARKET");
        self.modify_to_market(leg, &order_id).await
    }

    /// §4.6 "Progressive": up to `max_attempts`, quoting and pushing the
    /// limit toward market each round, falling back to MARKET once attempts
    /// are exhausted.
    async fn execute_progressive(&self, leg: &LegRequest) -> Result<LegResult, BrokerError> {
        let quote = self
            .broker
            .get_quote(&leg.symbol)
            .await
            .map_err(|e| BrokerError::Network { reason: e.to_string() })?;

        let mut limit_price = quote.last_price;
        let order_id = self.place(leg, Some(limit_price)).await?;

        for attempt in 1..=self.config.max_attempts {
            let state = self
                .broker
                .get_order_status(&order_id)
                .await
                .map_err(|e| BrokerError::Network { reason: e.to_string() })?;

            if state.status == BrokerOrderStatus::Filled {
                return Ok(self.leg_result(leg, &order_id, state.average_fill_price.unwrap_or(limit_price), state.filled_quantity, OrderExecutionStatus::Filled));
            }

            if attempt == self.config.max_attempts {
                break;
            }

            limit_price = self.step_toward_market(leg, limit_price, quote.last_price, attempt);
            self.broker
                .modify_order(&order_id, limit_price)
                .await
                .map_err(|e| BrokerError::Network { reason: e.to_string() })?;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        info!(symbol = %leg.symbol, "progressive attempts exhausted, falling back to MARKET");
        self.modify_to_market(leg, &order_id).await
    }

    fn step_toward_market(&self, leg: &LegRequest, current: Decimal, ltp: Decimal, attempt: u32) -> Decimal {
        let step = (ltp - current) / Decimal::from(self.config.max_attempts - attempt + 1);
        if leg.action == OrderAction::Buy {
            current + step.abs()
        } else {
            current - step.abs()
        }
    }

    async fn modify_to_market(&self, leg: &LegRequest, order_id: &str) -> Result<LegResult, BrokerError> {
        self.broker
            .cancel_order(order_id)
            .await
            .map_err(|e| BrokerError::Network { reason: e.to_string() })?;
        let market_order_id = self.place(leg, None).await?;
        let state = self
            .broker
            .get_order_status(&market_order_id)
            .await
            .map_err(|e| BrokerError::Network { reason: e.to_string() })?;

        let status = match state.status {
            BrokerOrderStatus::Filled => OrderExecutionStatus::Filled,
            BrokerOrderStatus::PartiallyFilled => OrderExecutionStatus::PartialFill,
            BrokerOrderStatus::Rejected => return Err(BrokerError::Rejected { reason: "market fallback rejected".to_string() }),
            _ => OrderExecutionStatus::Timeout,
        };

        Ok(self.leg_result(
            leg,
            &market_order_id,
            state.average_fill_price.unwrap_or(leg.signal_price),
            state.filled_quantity,
            status,
        ))
    }

    async fn place(&self, leg: &LegRequest, limit_price: Option<Decimal>) -> Result<String, BrokerError> {
        self.broker
            .place_order(OrderRequest {
                symbol: leg.symbol.clone(),
                action: leg.action,
                quantity: leg.quantity,
                limit_price,
                tag: "engine".to_string(),
            })
            .await
            .map_err(|e| BrokerError::Network { reason: e.to_string() })
    }

    fn leg_result(&self, leg: &LegRequest, order_id: &str, fill_price: Decimal, filled_quantity: Decimal, status: OrderExecutionStatus) -> LegResult {
        LegResult {
            symbol: leg.symbol.clone(),
            broker_order_id: order_id.to_string(),
            fill_price,
            filled_quantity,
            requested_quantity: leg.quantity,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PartialFillStrategy;
    use crate::infrastructure::broker::MockBroker;

    fn config(strategy: ExecutionStrategy) -> ExecutionEnvConfig {
        ExecutionEnvConfig {
            strategy,
            max_attempts: 4,
            signal_validation_enabled: true,
            partial_fill_strategy: PartialFillStrategy::AcceptAndReconcile,
            partial_fill_wait_timeout_seconds: 10,
        }
    }

    #[tokio::test]
    async fn single_futures_leg_fills_via_simple_limit() {
        let broker = Arc::new(MockBroker::new(dec!(52000)));
        let executor = OrderExecutor::new(broker, config(ExecutionStrategy::SimpleLimit));
        let legs = vec![LegRequest {
            symbol: "GOLDM26AUGFUT".to_string(),
            action: OrderAction::Buy,
            quantity: dec!(10),
            signal_price: dec!(52000),
        }];
        match executor.execute(&legs).await {
            ExecutionOutcome::Filled(results) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].filled_quantity, dec!(10));
            }
            other => panic!("expected Filled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn synthetic_legs_both_fill_via_progressive() {
        let broker = Arc::new(MockBroker::new(dec!(300)));
        let executor = OrderExecutor::new(broker, config(ExecutionStrategy::Progressive));
        let legs = vec![
            LegRequest {
                symbol: "BANKNIFTY26082752000PE".to_string(),
                action: OrderAction::Sell,
                quantity: dec!(60),
                signal_price: dec!(300),
            },
            LegRequest {
                symbol: "BANKNIFTY26082752000CE".to_string(),
                action: OrderAction::Buy,
                quantity: dec!(60),
                signal_price: dec!(300),
            },
        ];
        match executor.execute(&legs).await {
            ExecutionOutcome::Filled(results) => assert_eq!(results.len(), 2),
            other => panic!("expected Filled, got {other:?}"),
        }
    }
}
