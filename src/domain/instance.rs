//! Instance metadata for HA leader election (§3 "Instance Metadata", §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Standby,
    Crashed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub instance_id: String,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub last_signal_processed: Option<DateTime<Utc>>,
    pub is_leader: bool,
    pub leader_acquired_at: Option<DateTime<Utc>>,
    pub status: InstanceStatus,
}

impl InstanceMetadata {
    pub fn new(instance_id: String, now: DateTime<Utc>) -> Self {
        Self {
            instance_id,
            started_at: now,
            last_heartbeat: now,
            last_signal_processed: None,
            is_leader: false,
            leader_acquired_at: None,
            status: InstanceStatus::Standby,
        }
    }

    pub fn promote_to_leader(&mut self, now: DateTime<Utc>) {
        self.is_leader = true;
        self.leader_acquired_at = Some(now);
        self.status = InstanceStatus::Active;
    }

    pub fn demote(&mut self) {
        self.is_leader = false;
        self.leader_acquired_at = None;
        self.status = InstanceStatus::Standby;
    }

    pub fn is_stale(&self, now: DateTime<Utc>, heartbeat_timeout_secs: i64) -> bool {
        (now - self.last_heartbeat).num_seconds() > heartbeat_timeout_secs
    }

    /// §4.8 split-brain tiebreak: the instance with the older acquisition
    /// timestamp wins when both hold the Redis lock momentarily.
    pub fn older_claim_wins<'a>(a: &'a Self, b: &'a Self) -> Option<&'a Self> {
        match (a.leader_acquired_at, b.leader_acquired_at) {
            (Some(ta), Some(tb)) => Some(if ta <= tb { a } else { b }),
            (Some(_), None) => Some(a),
            (None, Some(_)) => Some(b),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn stale_after_timeout() {
        let now = Utc::now();
        let mut inst = InstanceMetadata::new("inst-1".into(), now - Duration::seconds(120));
        inst.last_heartbeat = now - Duration::seconds(120);
        assert!(inst.is_stale(now, 60));
        inst.last_heartbeat = now;
        assert!(!inst.is_stale(now, 60));
    }

    #[test]
    fn older_claim_wins_split_brain() {
        let now = Utc::now();
        let mut a = InstanceMetadata::new("a".into(), now);
        let mut b = InstanceMetadata::new("b".into(), now);
        a.promote_to_leader(now);
        b.promote_to_leader(now - Duration::seconds(5));
        let winner = InstanceMetadata::older_claim_wins(&a, &b).unwrap();
        assert_eq!(winner.instance_id, "b");
    }

    #[test]
    fn promote_then_demote_resets_leader_fields() {
        let now = Utc::now();
        let mut inst = InstanceMetadata::new("inst-1".into(), now);
        inst.promote_to_leader(now);
        assert!(inst.is_leader);
        inst.demote();
        assert!(!inst.is_leader);
        assert!(inst.leader_acquired_at.is_none());
    }
}
