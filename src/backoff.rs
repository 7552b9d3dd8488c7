//! Pacing between consecutive mirror requests.

use std::thread;
use std::time::Duration;

pub const DEFAULT_PACING: Duration = Duration::from_secs(2);

/// Called before every mirror attempt after the first one. `attempt` is the
/// zero-based index of the attempt about to be made, so it is never `0`.
pub trait Backoff: Send + Sync {
    fn pause(&self, attempt: usize);
}

/// Sleeps the calling thread for the same interval before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    interval: Duration,
}

impl FixedBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_PACING)
    }
}

impl Backoff for FixedBackoff {
    fn pause(&self, _attempt: usize) {
        if !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
    }
}

/// Does not wait at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn pause(&self, _attempt: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn fixed_backoff_defaults_to_two_seconds() {
        assert_eq!(FixedBackoff::default().interval(), Duration::from_secs(2));
    }

    #[test]
    fn fixed_backoff_sleeps_for_interval() {
        let backoff = FixedBackoff::new(Duration::from_millis(30));
        let started = Instant::now();
        backoff.pause(1);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn zero_interval_returns_immediately() {
        let started = Instant::now();
        FixedBackoff::new(Duration::ZERO).pause(3);
        NoBackoff.pause(3);
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
