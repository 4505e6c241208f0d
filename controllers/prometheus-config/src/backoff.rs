//! Requeue backoff for PrometheusServers that cannot be reached.
//!
//! Delays follow the Fibonacci sequence in whole minutes, capped:
//! 1m, 1m, 2m, 3m, 5m, 8m, 10m, 10m, ...

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Fibonacci delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    unit: Duration,
    cap: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600))
    }
}

impl BackoffSchedule {
    #[must_use]
    pub const fn new(unit: Duration, cap: Duration) -> Self {
        Self { unit, cap }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    /// Zero failures is treated like the first one.
    pub fn delay(&self, failures: u32) -> Duration {
        let (mut prev, mut current) = (0u32, 1u32);
        for _ in 1..failures.max(1) {
            (prev, current) = (current, prev.saturating_add(current));
            if self.unit.saturating_mul(current) >= self.cap {
                return self.cap;
            }
        }
        self.unit.saturating_mul(current).min(self.cap)
    }
}

/// Consecutive failure counters keyed by `namespace/name`
#[derive(Debug, Default)]
pub struct BackoffTracker {
    schedule: BackoffSchedule,
    failures: Mutex<HashMap<String, u32>>,
}

impl BackoffTracker {
    #[must_use]
    pub fn new(schedule: BackoffSchedule) -> Self {
        Self {
            schedule,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure for `key` and returns how long to wait before retrying.
    pub fn record_failure(&self, key: &str) -> Duration {
        let mut failures = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = failures.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        self.schedule.delay(*count)
    }

    /// Forgets the failures of `key` after a successful check.
    pub fn reset(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }

    /// Forgets every key failing `keep`, e.g. deleted resources.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|key, _| keep(key));
    }

    pub fn failures(&self, key: &str) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(d: Duration) -> u64 {
        d.as_secs() / 60
    }

    #[test]
    fn test_schedule_sequence() {
        let schedule = BackoffSchedule::default();
        let delays: Vec<u64> = (1..=9).map(|n| minutes(schedule.delay(n))).collect();
        assert_eq!(delays, vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
        assert_eq!(schedule.delay(0), Duration::from_secs(60));
        assert_eq!(schedule.delay(u32::MAX), Duration::from_secs(600));
    }

    #[test]
    fn test_tracker_is_per_key() {
        let tracker = BackoffTracker::default();
        assert_eq!(minutes(tracker.record_failure("ns/a")), 1);
        assert_eq!(minutes(tracker.record_failure("ns/a")), 1);
        assert_eq!(minutes(tracker.record_failure("ns/a")), 2);
        assert_eq!(minutes(tracker.record_failure("ns/b")), 1);
        assert_eq!(tracker.failures("ns/a"), 3);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let tracker = BackoffTracker::new(BackoffSchedule::new(
            Duration::from_secs(1),
            Duration::from_secs(4),
        ));
        for _ in 0..6 {
            tracker.record_failure("ns/a");
        }
        assert_eq!(tracker.record_failure("ns/a"), Duration::from_secs(4));

        tracker.reset("ns/a");
        assert_eq!(tracker.failures("ns/a"), 0);
        assert_eq!(tracker.record_failure("ns/a"), Duration::from_secs(1));
    }

    #[test]
    fn test_retain_forgets_deleted_keys() {
        let tracker = BackoffTracker::default();
        tracker.record_failure("ns/a");
        tracker.record_failure("ns/b");

        tracker.retain(|key| key == "ns/b");
        assert_eq!(tracker.failures("ns/a"), 0);
        assert_eq!(tracker.failures("ns/b"), 1);
    }
}
