//! Redis-backed primary leader lock (§4.8). `instance_metadata.is_leader`
//! under a DB transaction is the backup lock (`persistence::repositories`);
//! this is the primary, low-latency one.
//!
//! Dependency grounded on `other_examples/manifests/anthonylimo90-ab-bot` and
//! `N0tT1m-invest-iq`, which pair `redis` (`tokio-comp`, `connection-manager`)
//! with `sqlx` Postgres for exactly this kind of coordination; the teacher
//! itself has no distributed-lock precedent.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

#[derive(Clone)]
pub struct RedisLeaderLock {
    conn: ConnectionManager,
    key: String,
    ttl_seconds: u64,
}

impl RedisLeaderLock {
    pub async fn connect(redis_url: &str, key: String, ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("invalid REDIS_URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("failed to establish Redis connection")?;
        Ok(Self { conn, key, ttl_seconds })
    }

    /// Attempts to acquire the lock with `SET key value NX EX ttl`. Returns
    /// true if this instance now holds it.
    pub async fn try_acquire(&mut self, instance_id: &str) -> Result<bool> {
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(instance_id)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(&mut self.conn)
            .await
            .context("Redis SET NX failed")?;
        Ok(acquired.is_some())
    }

    /// Renews the TTL only if we still hold the lock (value matches).
    pub async fn renew(&mut self, instance_id: &str) -> Result<bool> {
        let held: Option<String> = self.conn.get(&self.key).await.context("Redis GET failed")?;
        if held.as_deref() != Some(instance_id) {
            return Ok(false);
        }
        let _: () = self
            .conn
            .expire(&self.key, self.ttl_seconds as i64)
            .await
            .context("Redis EXPIRE failed")?;
        Ok(true)
    }

    /// Releases the lock only if we still hold it, to avoid deleting a lock
    /// another instance has since acquired.
    pub async fn release(&mut self, instance_id: &str) -> Result<()> {
        let held: Option<String> = self.conn.get(&self.key).await.context("Redis GET failed")?;
        if held.as_deref() == Some(instance_id) {
            let _: () = self.conn.del(&self.key).await.context("Redis DEL failed")?;
        }
        Ok(())
    }

    pub async fn current_holder(&mut self) -> Result<Option<String>> {
        self.conn.get(&self.key).await.context("Redis GET failed")
    }
}
