//! Rate limiting for repeated error logs.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Lets one message through per cooldown window and counts the rest.
#[derive(Debug)]
pub struct ErrorThrottle {
    cooldown: Duration,
    last_logged: Option<Instant>,
    suppressed: u64,
}

impl ErrorThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_logged: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed)` when the caller should log now, with the
    /// number of occurrences swallowed since the previous log.
    pub fn admit(&mut self, now: Instant) -> Option<u64> {
        if self.window_open(now) {
            self.last_logged = Some(now);
            Some(std::mem::take(&mut self.suppressed))
        } else {
            self.suppressed += 1;
            None
        }
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// True once the window has passed with nothing left to report.
    pub fn is_idle(&self, now: Instant) -> bool {
        self.suppressed == 0 && self.window_open(now)
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_logged
            .is_none_or(|last| now.saturating_duration_since(last) >= self.cooldown)
    }
}

/// One [`ErrorThrottle`] per key, e.g. per session.
#[derive(Debug)]
pub struct KeyedThrottle<K> {
    cooldown: Duration,
    throttles: HashMap<K, ErrorThrottle>,
}

impl<K: Eq + Hash> KeyedThrottle<K> {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            throttles: HashMap::new(),
        }
    }

    pub fn admit(&mut self, key: K, now: Instant) -> Option<u64> {
        let cooldown = self.cooldown;
        self.throttles
            .entry(key)
            .or_insert_with(|| ErrorThrottle::new(cooldown))
            .admit(now)
    }

    /// Drops throttles that have nothing to report and whose window passed.
    pub fn prune(&mut self, now: Instant) {
        self.throttles.retain(|_, throttle| !throttle.is_idle(now));
    }

    pub fn tracked(&self) -> usize {
        self.throttles.len()
    }
}
