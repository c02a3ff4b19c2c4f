//! Postgres-backed implementations of the `domain::repositories` traits.
//!
//! Generalizes `Zuytan-rustrade`'s `SqliteOrderRepository` shape (pool field,
//! `sqlx::query` + manual row mapping, `ON CONFLICT DO NOTHING` idempotency)
//! to the richer row shapes this schema needs, with `$n` placeholders for
//! Postgres instead of SQLite's `?`.

use crate::domain::audit::{AuditOutcome, OrderExecutionLogEntry, OrderExecutionStatus, SignalAudit};
use crate::domain::capital::{CapitalTransaction, CapitalTransactionType};
use crate::domain::errors::StateConflictError;
use crate::domain::instance::{InstanceMetadata, InstanceStatus};
use crate::domain::instrument::InstrumentId;
use crate::domain::portfolio::PortfolioState;
use crate::domain::position::{ExecutionLegs, LimiterTag, Position, PositionStatus, RolloverStatus};
use crate::domain::pyramiding::PyramidingState;
use crate::domain::repositories::{
    CapitalTransactionRepository, InstanceMetadataRepository, OrderExecutionLogRepository,
    PortfolioRepository, PositionRepository, PyramidingRepository, SignalAuditRepository,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

pub struct PgPortfolioRepository {
    pool: PgPool,
}

impl PgPortfolioRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the single `portfolio_state` row on first boot; a no-op on
    /// every subsequent restart since the row already exists.
    pub async fn seed(&self, initial_capital: rust_decimal::Decimal) -> Result<()> {
        sqlx::query(
            "INSERT INTO portfolio_state \
             (id, initial_capital, closed_equity, equity_high, total_risk_amount, \
              total_risk_pct, total_vol_amount, total_vol_pct, margin_used, version) \
             VALUES (1, $1, $1, $1, 0, 0, 0, 0, 0, 0) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(initial_capital)
        .execute(&self.pool)
        .await
        .context("Failed to seed portfolio_state")?;
        Ok(())
    }
}

#[async_trait]
impl PortfolioRepository for PgPortfolioRepository {
    async fn load(&self) -> Result<PortfolioState> {
        let row = sqlx::query(
            "SELECT initial_capital, closed_equity, equity_high, total_risk_amount, \
             total_risk_pct, total_vol_amount, total_vol_pct, margin_used, version \
             FROM portfolio_state WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to load portfolio_state")?;

        Ok(PortfolioState {
            initial_capital: row.try_get("initial_capital")?,
            closed_equity: row.try_get("closed_equity")?,
            equity_high: row.try_get("equity_high")?,
            total_risk_amount: row.try_get("total_risk_amount")?,
            total_risk_pct: row.try_get("total_risk_pct")?,
            total_vol_amount: row.try_get("total_vol_amount")?,
            total_vol_pct: row.try_get("total_vol_pct")?,
            margin_used: row.try_get("margin_used")?,
            version: row.try_get("version")?,
        })
    }

    async fn save(&self, state: &PortfolioState, expected_version: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE portfolio_state SET initial_capital = $1, closed_equity = $2, \
             equity_high = $3, total_risk_amount = $4, total_risk_pct = $5, \
             total_vol_amount = $6, total_vol_pct = $7, margin_used = $8, version = version + 1 \
             WHERE id = 1 AND version = $9",
        )
        .bind(state.initial_capital)
        .bind(state.closed_equity)
        .bind(state.equity_high)
        .bind(state.total_risk_amount)
        .bind(state.total_risk_pct)
        .bind(state.total_vol_amount)
        .bind(state.total_vol_pct)
        .bind(state.margin_used)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to save portfolio_state")?;

        if result.rows_affected() == 0 {
            let actual = self.load().await.map(|s| s.version).unwrap_or(expected_version);
            return Err(StateConflictError {
                table: "portfolio_state",
                id: "1".to_string(),
                expected: expected_version,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

pub struct PgPositionRepository {
    pool: PgPool,
}

impl PgPositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_position(row: &sqlx::postgres::PgRow) -> Result<Position> {
        let instrument_str: String = row.try_get("instrument")?;
        let layer_str: String = row.try_get("layer")?;
        let status_str: String = row.try_get("status")?;
        let limiter_str: String = row.try_get("limiter")?;
        let rollover_status_str: String = row.try_get("rollover_status")?;
        let legs_json: serde_json::Value = row.try_get("legs")?;

        Ok(Position {
            position_id: row.try_get("position_id")?,
            instrument: InstrumentId::parse(&instrument_str)
                .with_context(|| format!("unknown instrument in row: {instrument_str}"))?,
            layer: crate::domain::signal::Layer::parse(&layer_str)
                .with_context(|| format!("unparsable layer in row: {layer_str}"))?,
            status: match status_str.as_str() {
                "open" => PositionStatus::Open,
                "closing" => PositionStatus::Closing,
                "closed" => PositionStatus::Closed,
                "partial" => PositionStatus::Partial,
                other => anyhow::bail!("unknown position status: {other}"),
            },
            entry_timestamp: row.try_get("entry_timestamp")?,
            entry_price: row.try_get("entry_price")?,
            lots: row.try_get("lots")?,
            quantity: row.try_get("quantity")?,
            initial_stop: row.try_get("initial_stop")?,
            current_stop: row.try_get("current_stop")?,
            highest_close: row.try_get("highest_close")?,
            unrealized_pnl: row.try_get("unrealized_pnl")?,
            realized_pnl: row.try_get("realized_pnl")?,
            atr_at_entry: row.try_get("atr_at_entry")?,
            limiter: match limiter_str.as_str() {
                "Risk" => LimiterTag::Risk,
                "Volatility" => LimiterTag::Volatility,
                "Margin" => LimiterTag::Margin,
                other => anyhow::bail!("unknown limiter tag: {other}"),
            },
            is_base_position: row.try_get("is_base_position")?,
            rollover_status: match rollover_status_str.as_str() {
                "none" => RolloverStatus::None,
                "pending" => RolloverStatus::Pending,
                "in_progress" => RolloverStatus::InProgress,
                "rolled" => RolloverStatus::Rolled,
                "failed" => RolloverStatus::Failed,
                other => anyhow::bail!("unknown rollover status: {other}"),
            },
            rollover_count: row.try_get::<i32, _>("rollover_count")? as u32,
            legs: serde_json::from_value::<ExecutionLegs>(legs_json)
                .context("failed to deserialize execution legs")?,
            strategy_id: row.try_get("strategy_id")?,
            exit_timestamp: row.try_get("exit_timestamp")?,
            exit_price: row.try_get("exit_price")?,
            exit_reason: row.try_get("exit_reason")?,
            version: row.try_get("version")?,
        })
    }
}

#[async_trait]
impl PositionRepository for PgPositionRepository {
    async fn find_open(&self, instrument: InstrumentId, layer_label: &str) -> Result<Option<Position>> {
        let row = sqlx::query(
            "SELECT * FROM portfolio_positions WHERE instrument = $1 AND layer = $2 \
             AND status IN ('open', 'partial')",
        )
        .bind(instrument.as_str())
        .bind(layer_label)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query open position")?;

        row.as_ref().map(Self::row_to_position).transpose()
    }

    async fn find_all_open(&self) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM portfolio_positions WHERE status IN ('open', 'partial')")
            .fetch_all(&self.pool)
            .await
            .context("Failed to query open positions")?;

        rows.iter().map(Self::row_to_position).collect()
    }

    async fn find_by_id(&self, position_id: &str) -> Result<Option<Position>> {
        let row = sqlx::query("SELECT * FROM portfolio_positions WHERE position_id = $1")
            .bind(position_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query position by id")?;

        row.as_ref().map(Self::row_to_position).transpose()
    }

    async fn save(&self, position: &Position, expected_version: i64) -> Result<()> {
        let legs_json = serde_json::to_value(&position.legs).context("failed to serialize legs")?;
        let result = sqlx::query(
            "UPDATE portfolio_positions SET status = $1, entry_price = $2, initial_stop = $3, \
             current_stop = $4, highest_close = $5, unrealized_pnl = $6, realized_pnl = $7, \
             rollover_status = $8, rollover_count = $9, legs = $10, exit_timestamp = $11, \
             exit_price = $12, exit_reason = $13, version = version + 1 \
             WHERE position_id = $14 AND version = $15",
        )
        .bind(format!("{:?}", position.status).to_lowercase())
        .bind(position.entry_price)
        .bind(position.initial_stop)
        .bind(position.current_stop)
        .bind(position.highest_close)
        .bind(position.unrealized_pnl)
        .bind(position.realized_pnl)
        .bind(format!("{:?}", position.rollover_status).to_lowercase())
        .bind(position.rollover_count as i32)
        .bind(legs_json)
        .bind(position.exit_timestamp)
        .bind(position.exit_price)
        .bind(&position.exit_reason)
        .bind(&position.position_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to save position")?;

        if result.rows_affected() == 0 {
            let actual = self
                .find_by_id(&position.position_id)
                .await?
                .map(|p| p.version)
                .unwrap_or(expected_version);
            return Err(StateConflictError {
                table: "portfolio_positions",
                id: position.position_id.clone(),
                expected: expected_version,
                actual,
            }
            .into());
        }
        Ok(())
    }

    async fn insert(&self, position: &Position) -> Result<()> {
        let legs_json = serde_json::to_value(&position.legs).context("failed to serialize legs")?;
        sqlx::query(
            "INSERT INTO portfolio_positions \
             (position_id, instrument, layer, status, entry_timestamp, entry_price, lots, \
              quantity, initial_stop, current_stop, highest_close, unrealized_pnl, realized_pnl, \
              atr_at_entry, limiter, is_base_position, rollover_status, rollover_count, legs, \
              strategy_id, version) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,0) \
             ON CONFLICT (position_id) DO NOTHING",
        )
        .bind(&position.position_id)
        .bind(position.instrument.as_str())
        .bind(position.layer.label())
        .bind(format!("{:?}", position.status).to_lowercase())
        .bind(position.entry_timestamp)
        .bind(position.entry_price)
        .bind(position.lots)
        .bind(position.quantity)
        .bind(position.initial_stop)
        .bind(position.current_stop)
        .bind(position.highest_close)
        .bind(position.unrealized_pnl)
        .bind(position.realized_pnl)
        .bind(position.atr_at_entry)
        .bind(format!("{:?}", position.limiter))
        .bind(position.is_base_position)
        .bind(format!("{:?}", position.rollover_status).to_lowercase())
        .bind(position.rollover_count as i32)
        .bind(legs_json)
        .bind(&position.strategy_id)
        .execute(&self.pool)
        .await
        .context("Failed to insert position")?;
        Ok(())
    }
}

pub struct PgPyramidingRepository {
    pool: PgPool,
}

impl PgPyramidingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PyramidingRepository for PgPyramidingRepository {
    async fn find(&self, instrument: InstrumentId) -> Result<Option<PyramidingState>> {
        let row = sqlx::query(
            "SELECT instrument, last_pyramid_entry_price, base_position_id, updated_at \
             FROM pyramiding_state WHERE instrument = $1",
        )
        .bind(instrument.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query pyramiding_state")?;

        row.map(|r| {
            Ok(PyramidingState {
                instrument,
                last_pyramid_entry_price: r.try_get("last_pyramid_entry_price")?,
                base_position_id: r.try_get("base_position_id")?,
                updated_at: r.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn upsert(&self, state: &PyramidingState) -> Result<()> {
        sqlx::query(
            "INSERT INTO pyramiding_state (instrument, last_pyramid_entry_price, base_position_id, updated_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (instrument) DO UPDATE SET \
               last_pyramid_entry_price = EXCLUDED.last_pyramid_entry_price, \
               base_position_id = EXCLUDED.base_position_id, \
               updated_at = EXCLUDED.updated_at",
        )
        .bind(state.instrument.as_str())
        .bind(state.last_pyramid_entry_price)
        .bind(&state.base_position_id)
        .bind(state.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert pyramiding_state")?;
        Ok(())
    }

    async fn clear(&self, instrument: InstrumentId) -> Result<()> {
        sqlx::query("DELETE FROM pyramiding_state WHERE instrument = $1")
            .bind(instrument.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to clear pyramiding_state")?;
        Ok(())
    }
}

pub struct PgSignalAuditRepository {
    pool: PgPool,
}

impl PgSignalAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn audit_outcome_str(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Processed => "PROCESSED",
        AuditOutcome::RejectedValidation => "REJECTED_VALIDATION",
        AuditOutcome::RejectedRisk => "REJECTED_RISK",
        AuditOutcome::RejectedDuplicate => "REJECTED_DUPLICATE",
        AuditOutcome::RejectedMarket => "REJECTED_MARKET",
        AuditOutcome::RejectedManual => "REJECTED_MANUAL",
        AuditOutcome::FailedOrder => "FAILED_ORDER",
        AuditOutcome::PartialFill => "PARTIAL_FILL",
    }
}

#[async_trait]
impl SignalAuditRepository for PgSignalAuditRepository {
    async fn fingerprint_exists(&self, fingerprint: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM signal_audit WHERE fingerprint = $1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check fingerprint uniqueness")?;
        Ok(row.is_some())
    }

    async fn record(&self, audit: &SignalAudit) -> Result<()> {
        sqlx::query(
            "INSERT INTO signal_audit \
             (id, fingerprint, outcome, reason, rejection_code, validation_json, sizing_json, \
              risk_json, execution_json, payload, processing_duration_ms, instance_id, recorded_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
             ON CONFLICT (fingerprint) DO NOTHING",
        )
        .bind(audit.id)
        .bind(&audit.fingerprint)
        .bind(audit_outcome_str(audit.outcome))
        .bind(&audit.reason)
        .bind(&audit.rejection_code)
        .bind(&audit.validation_json)
        .bind(&audit.sizing_json)
        .bind(&audit.risk_json)
        .bind(&audit.execution_json)
        .bind(&audit.payload)
        .bind(audit.processing_duration_ms)
        .bind(&audit.instance_id)
        .bind(audit.recorded_at)
        .execute(&self.pool)
        .await
        .context("Failed to record signal audit")?;
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM signal_audit WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to purge signal_audit")?;
        Ok(result.rows_affected())
    }

    async fn recent(&self, limit: i64, instrument: Option<&str>, outcome: Option<AuditOutcome>) -> Result<Vec<SignalAudit>> {
        let outcome_str = outcome.map(audit_outcome_str);
        let rows = sqlx::query(
            "SELECT id, fingerprint, outcome, reason, rejection_code, validation_json, sizing_json, \
             risk_json, execution_json, payload, processing_duration_ms, instance_id, recorded_at \
             FROM signal_audit \
             WHERE ($1::text IS NULL OR payload->>'instrument' = $1) \
               AND ($2::text IS NULL OR outcome = $2) \
             ORDER BY recorded_at DESC LIMIT $3",
        )
        .bind(instrument)
        .bind(outcome_str)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recent signal_audit rows")?;

        rows.into_iter()
            .map(|row| {
                Ok(SignalAudit {
                    id: row.try_get("id")?,
                    fingerprint: row.try_get("fingerprint")?,
                    outcome: audit_outcome_from_str(row.try_get("outcome")?),
                    reason: row.try_get("reason")?,
                    rejection_code: row.try_get("rejection_code")?,
                    validation_json: row.try_get("validation_json")?,
                    sizing_json: row.try_get("sizing_json")?,
                    risk_json: row.try_get("risk_json")?,
                    execution_json: row.try_get("execution_json")?,
                    payload: row.try_get("payload")?,
                    processing_duration_ms: row.try_get("processing_duration_ms")?,
                    instance_id: row.try_get("instance_id")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect::<Result<Vec<_>>>()
            .context("Failed to map signal_audit rows")
    }
}

fn audit_outcome_from_str(s: &str) -> AuditOutcome {
    match s {
        "REJECTED_VALIDATION" => AuditOutcome::RejectedValidation,
        "REJECTED_RISK" => AuditOutcome::RejectedRisk,
        "REJECTED_DUPLICATE" => AuditOutcome::RejectedDuplicate,
        "REJECTED_MARKET" => AuditOutcome::RejectedMarket,
        "REJECTED_MANUAL" => AuditOutcome::RejectedManual,
        "FAILED_ORDER" => AuditOutcome::FailedOrder,
        "PARTIAL_FILL" => AuditOutcome::PartialFill,
        _ => AuditOutcome::Processed,
    }
}

pub struct PgOrderExecutionLogRepository {
    pool: PgPool,
}

impl PgOrderExecutionLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_status_str(status: OrderExecutionStatus) -> &'static str {
    match status {
        OrderExecutionStatus::Filled => "FILLED",
        OrderExecutionStatus::PartialFill => "PARTIAL_FILL",
        OrderExecutionStatus::Rejected => "REJECTED",
        OrderExecutionStatus::Cancelled => "CANCELLED",
        OrderExecutionStatus::Timeout => "TIMEOUT",
    }
}

#[async_trait]
impl OrderExecutionLogRepository for PgOrderExecutionLogRepository {
    async fn record(&self, entry: &OrderExecutionLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO order_execution_log \
             (order_id, parent_order_id, position_id, symbol, action, requested_quantity, \
              filled_quantity, limit_price, fill_price, slippage_pct, status, placed_at, \
              completed_at, duration_ms) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14) \
             ON CONFLICT (order_id) DO UPDATE SET \
               filled_quantity = EXCLUDED.filled_quantity, \
               fill_price = EXCLUDED.fill_price, \
               slippage_pct = EXCLUDED.slippage_pct, \
               status = EXCLUDED.status, \
               completed_at = EXCLUDED.completed_at, \
               duration_ms = EXCLUDED.duration_ms",
        )
        .bind(&entry.order_id)
        .bind(&entry.parent_order_id)
        .bind(&entry.position_id)
        .bind(&entry.symbol)
        .bind(&entry.action)
        .bind(entry.requested_quantity)
        .bind(entry.filled_quantity)
        .bind(entry.limit_price)
        .bind(entry.fill_price)
        .bind(entry.slippage_pct)
        .bind(order_status_str(entry.status))
        .bind(entry.placed_at)
        .bind(entry.completed_at)
        .bind(entry.duration_ms)
        .execute(&self.pool)
        .await
        .context("Failed to record order execution log entry")?;
        Ok(())
    }

    async fn find_pending_for_position(&self, position_id: &str) -> Result<Vec<OrderExecutionLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM order_execution_log WHERE position_id = $1 AND status NOT IN ('FILLED', 'CANCELLED', 'REJECTED')",
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query pending order execution log entries")?;

        rows.into_iter()
            .map(|row| {
                let status_str: String = row.try_get("status")?;
                Ok(OrderExecutionLogEntry {
                    order_id: row.try_get("order_id")?,
                    parent_order_id: row.try_get("parent_order_id")?,
                    position_id: row.try_get("position_id")?,
                    symbol: row.try_get("symbol")?,
                    action: row.try_get("action")?,
                    requested_quantity: row.try_get("requested_quantity")?,
                    filled_quantity: row.try_get("filled_quantity")?,
                    limit_price: row.try_get("limit_price")?,
                    fill_price: row.try_get("fill_price")?,
                    slippage_pct: row.try_get("slippage_pct")?,
                    status: match status_str.as_str() {
                        "FILLED" => OrderExecutionStatus::Filled,
                        "PARTIAL_FILL" => OrderExecutionStatus::PartialFill,
                        "REJECTED" => OrderExecutionStatus::Rejected,
                        "CANCELLED" => OrderExecutionStatus::Cancelled,
                        _ => OrderExecutionStatus::Timeout,
                    },
                    placed_at: row.try_get("placed_at")?,
                    completed_at: row.try_get("completed_at")?,
                    duration_ms: row.try_get("duration_ms")?,
                })
            })
            .collect()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM order_execution_log WHERE placed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to purge order_execution_log")?;
        Ok(result.rows_affected())
    }
}

pub struct PgCapitalTransactionRepository {
    pool: PgPool,
}

impl PgCapitalTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn tx_type_str(tx_type: CapitalTransactionType) -> &'static str {
    match tx_type {
        CapitalTransactionType::Deposit => "DEPOSIT",
        CapitalTransactionType::Withdraw => "WITHDRAW",
        CapitalTransactionType::TradingPnl => "TRADING_PNL",
    }
}

#[async_trait]
impl CapitalTransactionRepository for PgCapitalTransactionRepository {
    async fn record(&self, tx: &CapitalTransaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO capital_transactions \
             (id, tx_type, amount, equity_before, equity_after, position_id, recorded_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(tx.id)
        .bind(tx_type_str(tx.tx_type))
        .bind(tx.amount)
        .bind(tx.equity_before)
        .bind(tx.equity_after)
        .bind(&tx.position_id)
        .bind(tx.recorded_at)
        .execute(&self.pool)
        .await
        .context("Failed to record capital transaction")?;
        Ok(())
    }

    async fn find_since(&self, start: DateTime<Utc>) -> Result<Vec<CapitalTransaction>> {
        let rows = sqlx::query("SELECT * FROM capital_transactions WHERE recorded_at >= $1 ORDER BY recorded_at")
            .bind(start)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query capital transactions")?;

        rows.into_iter()
            .map(|row| {
                let tx_type_str: String = row.try_get("tx_type")?;
                Ok(CapitalTransaction {
                    id: row.try_get("id")?,
                    tx_type: match tx_type_str.as_str() {
                        "DEPOSIT" => CapitalTransactionType::Deposit,
                        "WITHDRAW" => CapitalTransactionType::Withdraw,
                        _ => CapitalTransactionType::TradingPnl,
                    },
                    amount: row.try_get("amount")?,
                    equity_before: row.try_get("equity_before")?,
                    equity_after: row.try_get("equity_after")?,
                    position_id: row.try_get("position_id")?,
                    recorded_at: row.try_get("recorded_at")?,
                })
            })
            .collect()
    }
}

pub struct PgInstanceMetadataRepository {
    pool: PgPool,
}

impl PgInstanceMetadataRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_metadata(row: &sqlx::postgres::PgRow) -> Result<InstanceMetadata> {
        let status_str: String = row.try_get("status")?;
        Ok(InstanceMetadata {
            instance_id: row.try_get("instance_id")?,
            started_at: row.try_get("started_at")?,
            last_heartbeat: row.try_get("last_heartbeat")?,
            last_signal_processed: row.try_get("last_signal_processed")?,
            is_leader: row.try_get("is_leader")?,
            leader_acquired_at: row.try_get("leader_acquired_at")?,
            status: match status_str.as_str() {
                "active" => InstanceStatus::Active,
                "crashed" => InstanceStatus::Crashed,
                _ => InstanceStatus::Standby,
            },
        })
    }
}

#[async_trait]
impl InstanceMetadataRepository for PgInstanceMetadataRepository {
    async fn upsert(&self, metadata: &InstanceMetadata) -> Result<()> {
        let status_str = match metadata.status {
            InstanceStatus::Active => "active",
            InstanceStatus::Standby => "standby",
            InstanceStatus::Crashed => "crashed",
        };

        sqlx::query(
            "INSERT INTO instance_metadata \
             (instance_id, started_at, last_heartbeat, last_signal_processed, is_leader, \
              leader_acquired_at, status) \
             VALUES ($1,$2,$3,$4,$5,$6,$7) \
             ON CONFLICT (instance_id) DO UPDATE SET \
               last_heartbeat = EXCLUDED.last_heartbeat, \
               last_signal_processed = EXCLUDED.last_signal_processed, \
               is_leader = EXCLUDED.is_leader, \
               leader_acquired_at = EXCLUDED.leader_acquired_at, \
               status = EXCLUDED.status",
        )
        .bind(&metadata.instance_id)
        .bind(metadata.started_at)
        .bind(metadata.last_heartbeat)
        .bind(metadata.last_signal_processed)
        .bind(metadata.is_leader)
        .bind(metadata.leader_acquired_at)
        .bind(status_str)
        .execute(&self.pool)
        .await
        .context("Failed to upsert instance metadata")?;
        Ok(())
    }

    async fn find(&self, instance_id: &str) -> Result<Option<InstanceMetadata>> {
        let row = sqlx::query("SELECT * FROM instance_metadata WHERE instance_id = $1")
            .bind(instance_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query instance metadata")?;
        row.as_ref().map(Self::row_to_metadata).transpose()
    }

    async fn find_all(&self) -> Result<Vec<InstanceMetadata>> {
        let rows = sqlx::query("SELECT * FROM instance_metadata")
            .fetch_all(&self.pool)
            .await
            .context("Failed to query all instance metadata")?;
        rows.iter().map(Self::row_to_metadata).collect()
    }
}
