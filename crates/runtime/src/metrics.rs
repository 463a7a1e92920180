//! Tick metrics and statistics.
//!
//! Tracks how often the worker evaluates, how many buffs it hands out and how
//! often the host was not ready.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use solo_core::TickReport;

/// Tick metrics tracked by the solo worker.
///
/// Uses atomics for lock-free access across threads.
#[derive(Debug, Default)]
pub struct TickMetrics {
    /// Ticks that ran to completion
    ticks: AtomicU64,

    /// Ticks abandoned because the host was not ready
    failed_ticks: AtomicU64,

    /// Buff grants across all ticks
    applied: AtomicU64,

    /// Buff removals across all ticks
    cleared: AtomicU64,

    /// Per-session failures that did not abort their tick
    session_failures: AtomicU64,

    /// Solo sessions seen by the most recent tick
    solo_sessions: AtomicU64,

    /// Total time spent inside ticks, in nanoseconds
    total_tick_time_nanos: AtomicU64,

    /// Error logs written
    logged_errors: AtomicU64,

    /// Error logs swallowed by the throttle
    suppressed_errors: AtomicU64,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed tick.
    pub fn record_tick(&self, report: &TickReport, elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.applied
            .fetch_add(report.applied.len() as u64, Ordering::Relaxed);
        self.cleared
            .fetch_add(report.cleared.len() as u64, Ordering::Relaxed);
        self.session_failures
            .fetch_add(report.failures.len() as u64, Ordering::Relaxed);
        self.solo_sessions
            .store(report.solo as u64, Ordering::Relaxed);
        self.total_tick_time_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Records a tick that failed as a whole.
    pub fn record_failure(&self) {
        self.failed_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records whether the throttle let an error log through.
    pub fn record_error_log(&self, admitted: bool) {
        let counter = if admitted {
            &self.logged_errors
        } else {
            &self.suppressed_errors
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed_ticks.load(Ordering::Relaxed)
    }

    /// Calculates average tick duration.
    pub fn avg_tick_time(&self) -> Duration {
        let ticks = self.ticks();
        if ticks == 0 {
            return Duration::ZERO;
        }
        let total_nanos = self.total_tick_time_nanos.load(Ordering::Relaxed);
        Duration::from_nanos(total_nanos / ticks)
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks(),
            failed_ticks: self.failed_ticks(),
            applied: self.applied.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            session_failures: self.session_failures.load(Ordering::Relaxed),
            solo_sessions: self.solo_sessions.load(Ordering::Relaxed),
            avg_tick_time: self.avg_tick_time(),
            logged_errors: self.logged_errors.load(Ordering::Relaxed),
            suppressed_errors: self.suppressed_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of tick metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub applied: u64,
    pub cleared: u64,
    pub session_failures: u64,
    pub solo_sessions: u64,
    pub avg_tick_time: Duration,
    pub logged_errors: u64,
    pub suppressed_errors: u64,
}

impl MetricsSnapshot {
    /// Fraction of ticks that completed, 1.0 when none ran yet.
    pub fn success_rate(&self) -> f64 {
        let total = self.ticks + self.failed_ticks;
        if total == 0 {
            return 1.0;
        }
        self.ticks as f64 / total as f64
    }
}
