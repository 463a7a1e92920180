//! Wall-clock sources for tick timestamps.
use solo_core::Timestamp;
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Unix time in milliseconds via `chrono`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(chrono::Utc::now().timestamp_millis())
    }
}

/// Clock driven by tokio's timer, anchored at a fixed timestamp.
///
/// Follows `tokio::time::pause`/`advance`, so paused-time tests and timer
/// deadlines agree on what "now" is.
#[derive(Clone, Copy, Debug)]
pub struct TokioClock {
    origin: Instant,
    anchor: Timestamp,
}

impl TokioClock {
    pub fn new(anchor: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            anchor,
        }
    }

    pub fn starting_now() -> Self {
        Self::new(SystemClock.now())
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.anchor.saturating_add(self.origin.elapsed())
    }
}
