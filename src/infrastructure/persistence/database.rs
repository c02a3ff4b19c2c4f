//! Postgres connection pool and idempotent schema bootstrap (§6
//! "Persistence schema").
//!
//! Grounded on `Zuytan-rustrade`'s `infrastructure/persistence/database.rs`:
//! same `Database { pool }` wrapper and `CREATE TABLE IF NOT EXISTS`-based
//! `init()` in lieu of a migrations framework, swapped from
//! `sqlx::sqlite::SqlitePool` to `sqlx::postgres::PgPool`.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to Postgres")?;

        info!(%database_url, max_connections, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// `signal_log` and `signal_audit` (§3) are collapsed into one table: the
    /// fingerprint-uniqueness constraint that distinguishes them in the spec
    /// is carried by a single UNIQUE index here (DESIGN.md Open Question
    /// decision). `trading_strategies`, `strategy_trade_history`,
    /// `equity_audit_log`, and `leadership_history` are carried for schema
    /// completeness per §6 even though no core component owns their write
    /// path exclusively; leader election appends to `leadership_history` on
    /// every promote/demote, and `equity_audit_log` mirrors
    /// `capital_transactions` as a denormalized read-side trail.
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_state (
                id SMALLINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
                initial_capital NUMERIC NOT NULL,
                closed_equity NUMERIC NOT NULL,
                equity_high NUMERIC NOT NULL,
                total_risk_amount NUMERIC NOT NULL,
                total_risk_pct NUMERIC NOT NULL,
                total_vol_amount NUMERIC NOT NULL,
                total_vol_pct NUMERIC NOT NULL,
                margin_used NUMERIC NOT NULL,
                version BIGINT NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create portfolio_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_positions (
                position_id TEXT PRIMARY KEY,
                instrument TEXT NOT NULL,
                layer TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('open', 'closing', 'closed', 'partial')),
                entry_timestamp TIMESTAMPTZ NOT NULL,
                entry_price NUMERIC NOT NULL,
                lots NUMERIC NOT NULL,
                quantity NUMERIC NOT NULL,
                initial_stop NUMERIC NOT NULL,
                current_stop NUMERIC NOT NULL,
                highest_close NUMERIC NOT NULL,
                unrealized_pnl NUMERIC NOT NULL DEFAULT 0,
                realized_pnl NUMERIC NOT NULL DEFAULT 0,
                atr_at_entry NUMERIC NOT NULL,
                limiter TEXT NOT NULL,
                is_base_position BOOLEAN NOT NULL,
                rollover_status TEXT NOT NULL DEFAULT 'none',
                rollover_count INT NOT NULL DEFAULT 0,
                legs JSONB NOT NULL,
                strategy_id TEXT NOT NULL,
                exit_timestamp TIMESTAMPTZ,
                exit_price NUMERIC,
                exit_reason TEXT,
                version BIGINT NOT NULL DEFAULT 0,
                UNIQUE (instrument, layer, status) DEFERRABLE INITIALLY IMMEDIATE
            );
            CREATE INDEX IF NOT EXISTS idx_positions_open
                ON portfolio_positions (instrument, layer)
                WHERE status IN ('open', 'partial');
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create portfolio_positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pyramiding_state (
                instrument TEXT PRIMARY KEY,
                last_pyramid_entry_price NUMERIC NOT NULL,
                base_position_id TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pyramiding_state table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signal_audit (
                id UUID PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                outcome TEXT NOT NULL,
                reason TEXT,
                rejection_code TEXT,
                validation_json JSONB,
                sizing_json JSONB,
                risk_json JSONB,
                execution_json JSONB,
                payload JSONB NOT NULL,
                processing_duration_ms BIGINT NOT NULL,
                instance_id TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_signal_audit_fingerprint
                ON signal_audit (fingerprint);
            CREATE INDEX IF NOT EXISTS idx_signal_audit_recorded_at ON signal_audit (recorded_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create signal_audit table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_execution_log (
                order_id TEXT PRIMARY KEY,
                parent_order_id TEXT,
                position_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                requested_quantity NUMERIC NOT NULL,
                filled_quantity NUMERIC NOT NULL,
                limit_price NUMERIC,
                fill_price NUMERIC,
                slippage_pct NUMERIC,
                status TEXT NOT NULL,
                placed_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ,
                duration_ms BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_order_execution_log_position
                ON order_execution_log (position_id);
            CREATE INDEX IF NOT EXISTS idx_order_execution_log_placed_at
                ON order_execution_log (placed_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create order_execution_log table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS capital_transactions (
                id UUID PRIMARY KEY,
                tx_type TEXT NOT NULL,
                amount NUMERIC NOT NULL,
                equity_before NUMERIC NOT NULL,
                equity_after NUMERIC NOT NULL,
                position_id TEXT,
                recorded_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_capital_transactions_recorded_at
                ON capital_transactions (recorded_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create capital_transactions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instance_metadata (
                instance_id TEXT PRIMARY KEY,
                started_at TIMESTAMPTZ NOT NULL,
                last_heartbeat TIMESTAMPTZ NOT NULL,
                last_signal_processed TIMESTAMPTZ,
                is_leader BOOLEAN NOT NULL DEFAULT FALSE,
                leader_acquired_at TIMESTAMPTZ,
                status TEXT NOT NULL DEFAULT 'standby'
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create instance_metadata table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leadership_history (
                id BIGSERIAL PRIMARY KEY,
                instance_id TEXT NOT NULL,
                event TEXT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create leadership_history table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_audit_log (
                id BIGSERIAL PRIMARY KEY,
                closed_equity NUMERIC NOT NULL,
                equity_high NUMERIC NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create equity_audit_log table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_strategies (
                strategy_id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            );
            CREATE TABLE IF NOT EXISTS strategy_trade_history (
                id BIGSERIAL PRIMARY KEY,
                strategy_id TEXT NOT NULL REFERENCES trading_strategies (strategy_id),
                position_id TEXT NOT NULL,
                realized_pnl NUMERIC NOT NULL,
                closed_at TIMESTAMPTZ NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create trading_strategies/strategy_trade_history tables")?;

        info!("database schema initialized");
        Ok(())
    }
}
