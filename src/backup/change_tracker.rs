//! Thread-safe register of the latest change and the latest completed backup.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeState {
    pub last_change_time: Option<DateTime<Utc>>,
    pub last_backup_time: Option<DateTime<Utc>>,
}

impl ChangeState {
    /// A change newer than the last backup is waiting to be captured.
    pub fn has_pending_change(&self) -> bool {
        match (self.last_change_time, self.last_backup_time) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(change), Some(backup)) => change > backup,
        }
    }
}

/// Written by the notification drain, read by the polling loop. Both sides
/// hold the lock only long enough to copy two timestamps.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    state: Mutex<ChangeState>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChangeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Out-of-order delivery never moves the change time backwards.
    pub fn record_change(&self, now: DateTime<Utc>) {
        let mut state = self.lock();
        if state.last_change_time.map_or(true, |t| now > t) {
            state.last_change_time = Some(now);
        }
    }

    pub fn record_backup_completed(&self, now: DateTime<Utc>) {
        let mut state = self.lock();
        if state.last_backup_time.map_or(true, |t| now > t) {
            state.last_backup_time = Some(now);
        }
    }

    /// Level-triggered: stays true until a backup newer than the last change
    /// is recorded.
    pub fn should_backup(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        let state = self.snapshot();
        let Some(last_change) = state.last_change_time else {
            return false;
        };
        let cooldown = TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX);
        state.has_pending_change() && now.signed_duration_since(last_change) >= cooldown
    }

    pub fn snapshot(&self) -> ChangeState {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    const COOLDOWN: Duration = Duration::from_secs(5);

    #[test]
    fn test_no_change_never_backs_up() {
        let tracker = ChangeTracker::new();
        assert!(!tracker.should_backup(at(1_000), COOLDOWN));
    }

    #[test]
    fn test_burst_waits_for_last_change() {
        let tracker = ChangeTracker::new();
        for t in [0, 1, 2] {
            tracker.record_change(at(t));
        }

        assert!(!tracker.should_backup(at(3), COOLDOWN));
        assert!(!tracker.should_backup(at(6), COOLDOWN));
        assert!(tracker.should_backup(at(7), COOLDOWN));
        assert!(tracker.should_backup(at(100), COOLDOWN));
    }

    #[test]
    fn test_out_of_order_keeps_latest_change() {
        let tracker = ChangeTracker::new();
        tracker.record_change(at(10));
        tracker.record_change(at(4));

        assert_eq!(tracker.snapshot().last_change_time, Some(at(10)));
        assert!(!tracker.should_backup(at(14), COOLDOWN));
        assert!(tracker.should_backup(at(15), COOLDOWN));
    }

    #[test]
    fn test_quiet_after_backup_until_new_change() {
        let tracker = ChangeTracker::new();
        tracker.record_change(at(0));
        tracker.record_backup_completed(at(7));

        for t in [7, 8, 50, 10_000] {
            assert!(!tracker.should_backup(at(t), COOLDOWN));
        }

        tracker.record_change(at(20));
        assert!(!tracker.should_backup(at(24), COOLDOWN));
        assert!(tracker.should_backup(at(25), COOLDOWN));
    }

    #[test]
    fn test_change_equal_to_backup_time_is_not_pending() {
        let tracker = ChangeTracker::new();
        tracker.record_change(at(5));
        tracker.record_backup_completed(at(5));

        assert!(!tracker.snapshot().has_pending_change());
        assert!(!tracker.should_backup(at(60), COOLDOWN));
    }

    #[test]
    fn test_backup_time_is_monotonic() {
        let tracker = ChangeTracker::new();
        tracker.record_backup_completed(at(10));
        tracker.record_backup_completed(at(3));

        assert_eq!(tracker.snapshot().last_backup_time, Some(at(10)));
    }

    #[test]
    fn test_zero_cooldown_backs_up_immediately() {
        let tracker = ChangeTracker::new();
        tracker.record_change(at(0));
        assert!(tracker.should_backup(at(0), Duration::ZERO));
    }

    #[test]
    fn test_poll_before_change_clock_skew() {
        let tracker = ChangeTracker::new();
        tracker.record_change(at(10));
        assert!(!tracker.should_backup(at(9), Duration::ZERO));
    }

    #[test]
    fn test_concurrent_writers_keep_maximum() {
        let tracker = Arc::new(ChangeTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        tracker.record_change(at(worker * 1_000 + i));
                        let _ = tracker.should_backup(at(0), COOLDOWN);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.snapshot().last_change_time, Some(at(7_999)));
    }
}
