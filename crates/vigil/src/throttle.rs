use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Lets a call through only if at least `interval` has passed since the last
/// call that was let through. Rejected calls do not reset the clock.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn call<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let now = Instant::now();
        {
            let mut last = self.last_accepted.lock();
            if let Some(previous) = *last
                && now.duration_since(previous) < self.interval
            {
                return None;
            }
            *last = Some(now);
        }
        Some(f())
    }

    /// Forgets the last accepted call, so the next one is let through.
    pub fn reset(&self) {
        *self.last_accepted.lock() = None;
    }
}
