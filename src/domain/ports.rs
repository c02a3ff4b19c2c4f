//! Outbound ports the application layer drives (§6 "Broker port interface",
//! §9 live-vs-backtest clock injection, SPEC_FULL.md Notifier port).
//!
//! Shaped on `Zuytan-rustrade`'s `domain/ports.rs` (`MarketDataService`,
//! `ExecutionService`): `#[async_trait]`, `Send + Sync`, `anyhow::Result`.

use crate::domain::instrument::InstrumentId;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub action: OrderAction,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub tag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerOrderStatus {
    Open,
    Filled,
    PartiallyFilled,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrderState {
    pub broker_order_id: String,
    pub status: BrokerOrderStatus,
    pub filled_quantity: Decimal,
    pub average_fill_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub net_quantity: Decimal,
    pub average_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub available_margin: Decimal,
    pub used_margin: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last_price: Decimal,
    pub close_price: Decimal,
}

/// The single seam through which the engine talks to the exchange/broker.
/// Commodity minis place one leg; Bank Nifty synthetic futures place two
/// (§4.6), so callers issue one `OrderRequest` per leg.
#[async_trait]
pub trait BrokerPort: Send + Sync {
    async fn place_order(&self, order: OrderRequest) -> Result<String>;
    async fn modify_order(&self, broker_order_id: &str, new_limit_price: Decimal) -> Result<()>;
    async fn cancel_order(&self, broker_order_id: &str) -> Result<()>;
    async fn get_order_status(&self, broker_order_id: &str) -> Result<BrokerOrderState>;
    async fn get_positions(&self) -> Result<Vec<BrokerPosition>>;
    async fn get_margins(&self) -> Result<MarginSnapshot>;
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;
}

/// Injectable clock so scenario tests can drive the scheduler and stop
/// manager against synthetic timelines instead of wall-clock time (§9).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub severity: NotificationSeverity,
    pub title: String,
    pub body: String,
    pub instrument: Option<InstrumentId>,
}

/// Outbound alerting (webhook/Slack-style), carried as ambient stack per
/// SPEC_FULL.md even though no external channel is named by the distilled
/// spec.
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
