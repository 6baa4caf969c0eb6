//! Decides on each poll whether the quiet period has elapsed and a backup is
//! owed, and drives the cycle when it is.
//!
//! The engine is a two-state machine. It is [`DebounceState::Idle`] while no
//! change is pending or the last change is still inside the cooldown, and
//! [`DebounceState::Ready`] once [`ChangeTracker::should_backup`] holds. A
//! ready engine runs one [`BackupCycle`]. Only a successful cycle clears the
//! pending condition, so a failed one is retried on a later poll, no earlier
//! than its backoff allows.

use crate::backup::backup_config::BackupConfig;
use crate::backup::change_tracker::ChangeTracker;
use crate::backup::orchestrator::CycleReport;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::shutdown::ShutdownSignal;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep of the [`Ticker`].
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Ready,
}

/// One snapshot-and-prune pass, invoked when the engine is ready.
///
/// A successful cycle is responsible for calling
/// [`ChangeTracker::record_backup_completed`].
pub trait BackupCycle {
    fn run_cycle(&self, tracker: &ChangeTracker, now: DateTime<Utc>) -> Result<CycleReport>;
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing pending, or still inside the cooldown.
    Idle,
    /// Pending, but a previous failure pushed the next attempt out.
    Deferred { until: DateTime<Utc> },
    BackedUp(CycleReport),
    Failed {
        error: Error,
        retry_at: DateTime<Utc>,
    },
}

#[derive(Debug)]
pub struct DebounceEngine {
    cooldown: Duration,
    poll_interval: Duration,
    max_retry_backoff: Duration,
    consecutive_failures: u32,
    retry_not_before: Option<DateTime<Utc>>,
}

impl DebounceEngine {
    pub fn new(cooldown: Duration, poll_interval: Duration, max_retry_backoff: Duration) -> Self {
        Self {
            cooldown,
            poll_interval,
            max_retry_backoff,
            consecutive_failures: 0,
            retry_not_before: None,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(
            config.cooldown(),
            config.poll_interval(),
            config.max_retry_backoff(),
        )
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn state(&self, tracker: &ChangeTracker, now: DateTime<Utc>) -> DebounceState {
        if tracker.should_backup(now, self.cooldown) {
            DebounceState::Ready
        } else {
            DebounceState::Idle
        }
    }

    /// Evaluates the debounce condition at `now` and runs `cycle` if due.
    pub fn tick<C>(&mut self, tracker: &ChangeTracker, now: DateTime<Utc>, cycle: &C) -> TickOutcome
    where
        C: BackupCycle + ?Sized,
    {
        if self.state(tracker, now) == DebounceState::Idle {
            return TickOutcome::Idle;
        }
        if let Some(until) = self.retry_not_before {
            if now < until {
                return TickOutcome::Deferred { until };
            }
        }

        match cycle.run_cycle(tracker, now) {
            Ok(report) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        "Backup succeeded after {} failed attempts",
                        self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
                self.retry_not_before = None;
                TickOutcome::BackedUp(report)
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let delay = self.retry_delay();
                let retry_at = TimeDelta::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                self.retry_not_before = Some(retry_at);
                tracing::warn!(
                    "Backup attempt {} failed, next attempt in {}",
                    self.consecutive_failures,
                    humantime::format_duration(delay)
                );
                TickOutcome::Failed { error, retry_at }
            }
        }
    }

    /// `poll_interval * 2^(n-1)` for the n-th consecutive failure, capped at
    /// `max_retry_backoff`.
    fn retry_delay(&self) -> Duration {
        let exponent = self.consecutive_failures.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.poll_interval
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
            .min(self.max_retry_backoff)
    }
}

/// Paces the polling loop and stops it on shutdown.
#[derive(Clone, Copy, Debug)]
pub struct Ticker {
    interval: Duration,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Blocks for one interval. Returns `false` as soon as shutdown has been
    /// requested, before or during the wait.
    /// An interval too large to represent never elapses.
    pub fn wait(&self, shutdown: &ShutdownSignal) -> bool {
        let deadline = Instant::now().checked_add(self.interval);
        loop {
            if shutdown.is_requested() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => SLEEP_SLICE,
            };
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }
}
