//! Repository Pattern abstractions over Postgres persistence (§6
//! "Persistence schema").
//!
//! Follows `Zuytan-rustrade`'s `domain/repositories.rs`: traits separate
//! business logic from storage, `#[async_trait]`, `Send + Sync`,
//! `anyhow::Result`. That file persisted one `TradeRepository`/
//! `PortfolioRepository` pair backed by SQLite; this crate's schema has
//! more tables so the split follows §3's per-entity breakdown instead.

use crate::domain::audit::{AuditOutcome, OrderExecutionLogEntry, SignalAudit};
use crate::domain::capital::CapitalTransaction;
use crate::domain::instance::InstanceMetadata;
use crate::domain::instrument::InstrumentId;
use crate::domain::portfolio::PortfolioState;
use crate::domain::position::Position;
use crate::domain::pyramiding::PyramidingState;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The single portfolio-state row, optimistically locked via `version`
/// (generalizes `PortfolioStateManager`'s in-memory `VersionedPortfolio`,
/// `application/monitoring/portfolio_state_manager.rs`, to a persisted row).
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    async fn load(&self) -> Result<PortfolioState>;

    /// Fails with `StateConflictError` if `expected_version` does not match
    /// the row currently in storage.
    async fn save(&self, state: &PortfolioState, expected_version: i64) -> Result<()>;
}

#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn find_open(&self, instrument: InstrumentId, layer_label: &str) -> Result<Option<Position>>;
    async fn find_all_open(&self) -> Result<Vec<Position>>;
    async fn find_by_id(&self, position_id: &str) -> Result<Option<Position>>;
    async fn save(&self, position: &Position, expected_version: i64) -> Result<()>;
    async fn insert(&self, position: &Position) -> Result<()>;
}

#[async_trait]
pub trait PyramidingRepository: Send + Sync {
    async fn find(&self, instrument: InstrumentId) -> Result<Option<PyramidingState>>;
    async fn upsert(&self, state: &PyramidingState) -> Result<()>;
    async fn clear(&self, instrument: InstrumentId) -> Result<()>;
}

#[async_trait]
pub trait SignalAuditRepository: Send + Sync {
    async fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool>;
    async fn record(&self, audit: &SignalAudit) -> Result<()>;
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Backs `/signals?limit=&instrument=&status=` (§6 read endpoints).
    async fn recent(&self, limit: i64, instrument: Option<&str>, outcome: Option<AuditOutcome>) -> Result<Vec<SignalAudit>>;
}

#[async_trait]
pub trait OrderExecutionLogRepository: Send + Sync {
    async fn record(&self, entry: &OrderExecutionLogEntry) -> Result<()>;
    async fn find_pending_for_position(&self, position_id: &str) -> Result<Vec<OrderExecutionLogEntry>>;
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait CapitalTransactionRepository: Send + Sync {
    async fn record(&self, tx: &CapitalTransaction) -> Result<()>;
    async fn find_since(&self, start: DateTime<Utc>) -> Result<Vec<CapitalTransaction>>;
}

#[async_trait]
pub trait InstanceMetadataRepository: Send + Sync {
    async fn upsert(&self, metadata: &InstanceMetadata) -> Result<()>;
    async fn find(&self, instance_id: &str) -> Result<Option<InstanceMetadata>>;
    async fn find_all(&self) -> Result<Vec<InstanceMetadata>>;
}
