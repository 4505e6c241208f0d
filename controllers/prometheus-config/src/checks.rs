//! Last health check of each PrometheusServer.
//!
//! A server reconcile is triggered by its own status patches and by every
//! exporter event in its namespace. Those reuse the recorded result until
//! the check is due again, so the server is contacted once per resync or
//! backoff period and the failure count only grows on real checks.

use crate::status::ServerHealth;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CheckRecord {
    /// `metadata.generation` the check was made against
    generation: Option<i64>,
    health: ServerHealth,
    next_check: Instant,
}

/// Health check results keyed like `BackoffTracker`
#[derive(Debug, Default)]
pub struct HealthChecks {
    records: Mutex<HashMap<String, CheckRecord>>,
}

impl HealthChecks {
    /// The recorded health of `key` and the time left until its next check,
    /// if one was made against `generation` and is not yet due.
    pub fn fresh(&self, key: &str, generation: Option<i64>, now: Instant) -> Option<(ServerHealth, Duration)> {
        let records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = records.get(key)?;
        if record.generation != generation || now >= record.next_check {
            return None;
        }
        Some((record.health.clone(), record.next_check - now))
    }

    pub fn record(&self, key: &str, generation: Option<i64>, health: ServerHealth, next_check: Instant) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                key.to_string(),
                CheckRecord {
                    generation,
                    health,
                    next_check,
                },
            );
    }

    /// Drops records whose key fails `keep`.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|key, _| keep(key));
    }

    pub(crate) fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> ServerHealth {
        ServerHealth::Unreachable("timeout".to_string())
    }

    #[test]
    fn test_record_is_fresh_until_due() {
        let checks = HealthChecks::default();
        let start = Instant::now();
        assert!(checks.fresh("ns/a", Some(1), start).is_none());

        checks.record("ns/a", Some(1), unreachable(), start + Duration::from_secs(60));

        let (health, remaining) = checks
            .fresh("ns/a", Some(1), start + Duration::from_secs(20))
            .unwrap();
        assert_eq!(health, unreachable());
        assert_eq!(remaining, Duration::from_secs(40));

        assert!(checks.fresh("ns/a", Some(1), start + Duration::from_secs(60)).is_none());
        assert!(checks.fresh("ns/b", Some(1), start).is_none());
    }

    #[test]
    fn test_new_generation_invalidates_record() {
        let checks = HealthChecks::default();
        let start = Instant::now();
        checks.record("ns/a", Some(1), unreachable(), start + Duration::from_secs(60));
        assert!(checks.fresh("ns/a", Some(2), start).is_none());
    }

    #[test]
    fn test_retain() {
        let checks = HealthChecks::default();
        let due = Instant::now() + Duration::from_secs(60);
        checks.record("ns/a", None, unreachable(), due);
        checks.record("ns/b", None, unreachable(), due);

        checks.retain(|key| key == "ns/b");
        assert_eq!(checks.len(), 1);
        assert!(checks.fresh("ns/b", None, Instant::now()).is_some());
    }
}
