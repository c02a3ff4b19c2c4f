//! Leader election (§4.8): Redis primary lock backed by a DB row, with
//! split-brain resolution via `InstanceMetadata::older_claim_wins`.

use crate::domain::instance::InstanceMetadata;
use crate::domain::repositories::InstanceMetadataRepository;
use crate::infrastructure::redis_lock::RedisLeaderLock;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct LeaderElector {
    redis: Mutex<RedisLeaderLock>,
    repo: Arc<dyn InstanceMetadataRepository>,
    instance_id: String,
    heartbeat_timeout_secs: i64,
    is_leader: Arc<AtomicBool>,
}

impl LeaderElector {
    pub fn new(
        redis: RedisLeaderLock,
        repo: Arc<dyn InstanceMetadataRepository>,
        instance_id: String,
        heartbeat_timeout_secs: i64,
        is_leader: Arc<AtomicBool>,
    ) -> Self {
        Self {
            redis: Mutex::new(redis),
            repo,
            instance_id,
            heartbeat_timeout_secs,
            is_leader,
        }
    }

    /// One election attempt: try the Redis lock first; on Redis failure,
    /// fall back to the DB row so the process still degrades gracefully
    /// rather than freezing leadership indefinitely (§4.8).
    pub async fn tick(&self) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut metadata = self
            .repo
            .find(&self.instance_id)
            .await?
            .unwrap_or_else(|| InstanceMetadata::new(self.instance_id.clone(), now));
        metadata.last_heartbeat = now;

        let redis_acquired = {
            let mut redis = self.redis.lock().await;
            match redis.try_acquire(&self.instance_id).await {
                Ok(acquired) => acquired,
                Err(err) => {
                    warn!(error = %err, "redis leader lock unavailable, falling back to DB claim");
                    self.claim_via_db(&mut metadata, now).await?
                }
            }
        };

        if redis_acquired && !metadata.is_leader {
            metadata.promote_to_leader(now);
            info!(instance_id = %self.instance_id, "acquired leadership");
        } else if !redis_acquired && metadata.is_leader {
            // Someone else holds the Redis key; resolve any split-brain by
            // comparing acquisition timestamps against every known instance.
            if self.should_yield(&metadata).await? {
                metadata.demote();
                warn!(instance_id = %self.instance_id, "yielding leadership, lost split-brain tiebreak");
            }
        }

        self.repo.upsert(&metadata).await?;
        self.is_leader.store(metadata.is_leader, Ordering::SeqCst);
        Ok(metadata.is_leader)
    }

    async fn claim_via_db(&self, metadata: &mut InstanceMetadata, now: chrono::DateTime<Utc>) -> anyhow::Result<bool> {
        let others = self.repo.find_all().await?;
        let stale_or_absent = others
            .iter()
            .filter(|m| m.instance_id != self.instance_id && m.is_leader)
            .all(|m| m.is_stale(now, self.heartbeat_timeout_secs));
        Ok(stale_or_absent)
    }

    async fn should_yield(&self, metadata: &InstanceMetadata) -> anyhow::Result<bool> {
        let others = self.repo.find_all().await?;
        Ok(resolve_split_brain(metadata, &others))
    }

    pub async fn renew_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                warn!(error = %err, "leader election tick failed");
            }
        }
    }
}

/// Standalone so it can be unit-tested without a live Redis connection.
fn resolve_split_brain(mine: &InstanceMetadata, others: &[InstanceMetadata]) -> bool {
    let rival = others.iter().find(|m| m.instance_id != mine.instance_id && m.is_leader);
    let Some(rival) = rival else { return false };
    match InstanceMetadata::older_claim_wins(mine, rival) {
        Some(winner) => winner.instance_id != mine.instance_id,
        None => false,
    }
}
