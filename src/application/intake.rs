//! Webhook intake and deduplication (§4.1).
//!
//! Three-layer dedup per §4.1/§9(d): an in-memory LRU is best-effort and
//! performance-only, never authoritative; the `signal_audit` fingerprint
//! unique index is what actually prevents a double-processed signal. This
//! module owns the in-process check; the persistence layer enforces the
//! rest via `SignalAuditRepository::fingerprint_exists` / the `ON CONFLICT`
//! clause in `PgSignalAuditRepository::record`.

use crate::domain::repositories::SignalAuditRepository;
use crate::domain::signal::Signal;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 1024;

pub struct DedupCache {
    recent: Mutex<LruCache<String, ()>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self {
            recent: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns `true` if this fingerprint was already seen in-process.
    /// Inserting is done unconditionally so repeated hits refresh recency.
    fn seen_locally(&self, fingerprint: &str) -> bool {
        let mut cache = self.recent.lock().expect("dedup cache mutex poisoned");
        let already = cache.contains(fingerprint);
        cache.put(fingerprint.to_string(), ());
        already
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Consults the LRU first (cheap, avoids a DB round-trip on hot duplicates),
/// then falls through to the authoritative fingerprint-uniqueness check.
pub async fn is_duplicate(
    cache: &DedupCache,
    audit_repo: &dyn SignalAuditRepository,
    signal: &Signal,
) -> anyhow::Result<bool> {
    let fingerprint = signal.fingerprint();
    if cache.seen_locally(&fingerprint) {
        debug!(fingerprint, "duplicate caught by in-memory cache");
        return Ok(true);
    }
    let exists = audit_repo.fingerprint_exists(&fingerprint).await?;
    if exists {
        debug!(fingerprint, "duplicate caught by fingerprint uniqueness");
    }
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::SignalAudit;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex as StdMutex;

    struct FakeAuditRepo {
        seen: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl SignalAuditRepository for FakeAuditRepo {
        async fn fingerprint_exists(&self, fingerprint: &str) -> anyhow::Result<bool> {
            Ok(self.seen.lock().unwrap().iter().any(|f| f == fingerprint))
        }
        async fn record(&self, audit: &SignalAudit) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(audit.fingerprint.clone());
            Ok(())
        }
        async fn purge_older_than(&self, _cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn recent(
            &self,
            _limit: i64,
            _instrument: Option<&str>,
            _outcome: Option<crate::domain::audit::AuditOutcome>,
        ) -> anyhow::Result<Vec<SignalAudit>> {
            Ok(Vec::new())
        }
    }

    fn sample_signal() -> Signal {
        crate::domain::signal::parse_signal(
            serde_json::json!({
                "type": "BASE_ENTRY",
                "instrument": "BANK_NIFTY",
                "position": "Long_1",
                "price": 52000.0,
                "stop": 51800.0,
                "atr": 350.0,
                "timestamp": "2026-07-28T09:20:00Z",
            }),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_signal_is_not_duplicate() {
        let cache = DedupCache::new();
        let repo = FakeAuditRepo { seen: StdMutex::new(vec![]) };
        assert!(!is_duplicate(&cache, &repo, &sample_signal()).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_signal_caught_by_local_cache() {
        let cache = DedupCache::new();
        let repo = FakeAuditRepo { seen: StdMutex::new(vec![]) };
        let signal = sample_signal();
        assert!(!is_duplicate(&cache, &repo, &signal).await.unwrap());
        assert!(is_duplicate(&cache, &repo, &signal).await.unwrap());
    }

    #[tokio::test]
    async fn repeated_signal_caught_by_db_when_cache_missed() {
        let repo = FakeAuditRepo {
            seen: StdMutex::new(vec![sample_signal().fingerprint()]),
        };
        let cache = DedupCache::new();
        assert!(is_duplicate(&cache, &repo, &sample_signal()).await.unwrap());
    }
}
