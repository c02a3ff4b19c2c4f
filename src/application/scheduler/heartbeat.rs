//! Heartbeat and retention (§4.9): every instance stamps `last_heartbeat`
//! on its own metadata row independent of leader status, and the leader
//! additionally purges audit/order-log rows past the retention window.

use crate::domain::instance::InstanceMetadata;
use crate::domain::repositories::{InstanceMetadataRepository, OrderExecutionLogRepository, SignalAuditRepository};
use chrono::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const AUDIT_RETENTION_DAYS: i64 = 90;

pub struct HeartbeatWriter {
    repo: Arc<dyn InstanceMetadataRepository>,
    audit_repo: Arc<dyn SignalAuditRepository>,
    order_log_repo: Arc<dyn OrderExecutionLogRepository>,
    instance_id: String,
    is_leader: Arc<AtomicBool>,
}

impl HeartbeatWriter {
    pub fn new(
        repo: Arc<dyn InstanceMetadataRepository>,
        audit_repo: Arc<dyn SignalAuditRepository>,
        order_log_repo: Arc<dyn OrderExecutionLogRepository>,
        instance_id: String,
        is_leader: Arc<AtomicBool>,
    ) -> Self {
        Self { repo, audit_repo, order_log_repo, instance_id, is_leader }
    }

    /// Stamps this instance's heartbeat row; if this instance currently
    /// holds leadership, also purges audit/order-log rows older than the
    /// retention window so only one instance ever runs the purge.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let now = chrono::Utc::now();
        let mut metadata = self
            .repo
            .find(&self.instance_id)
            .await?
            .unwrap_or_else(|| InstanceMetadata::new(self.instance_id.clone(), now));
        metadata.last_heartbeat = now;
        self.repo.upsert(&metadata).await?;

        if self.is_leader.load(Ordering::SeqCst) {
            let cutoff = now - Duration::days(AUDIT_RETENTION_DAYS);
            let audit_purged = self.audit_repo.purge_older_than(cutoff).await?;
            let log_purged = self.order_log_repo.purge_older_than(cutoff).await?;
            if audit_purged > 0 || log_purged > 0 {
                info!(audit_purged, log_purged, "retention purge complete");
            }
        }
        Ok(())
    }

    pub async fn run_loop(self: Arc<Self>, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                warn!(error = %err, "heartbeat tick failed");
            }
        }
    }
}
