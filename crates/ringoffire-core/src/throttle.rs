//! Leading-edge rate limiting for outbound updates.

use std::time::{Duration, Instant};

/// Lets the first call through, then drops calls until `interval` has
/// passed since the last one that fired. Dropped calls are not queued.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true (and starts a new window) if a call at `now` may fire.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }

    /// Forget the last emission so the next call fires.
    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}
