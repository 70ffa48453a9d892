//! Clock sources for envelope timestamps
//!
//! - `SystemClock`: wall-clock Unix epoch milliseconds (UTC), never going
//!   backwards
//! - `ManualClock`: for tests, returns whatever it was set to

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of `ts_ms` values
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch, UTC
    fn now_ms(&self) -> i64;
}

/// Wall clock, clamped to be non-decreasing
///
/// A backwards step of the system time (e.g. NTP correction) repeats the
/// last value handed out until the wall clock catches up.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn clamp(&self, wall_ms: i64) -> i64 {
        let previous = self.last.fetch_max(wall_ms, Ordering::SeqCst);
        previous.max(wall_ms)
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.clamp(Utc::now().timestamp_millis())
    }
}

/// Manually driven clock
///
/// Every read can optionally advance the clock by a fixed step, which
/// gives strictly increasing timestamps in sequential tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
    step: i64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
            step: 0,
        }
    }

    /// Advance by `step_ms` after each read
    pub fn with_step(mut self, step_ms: i64) -> Self {
        self.step = step_ms;
        self
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_epoch_millis() {
        let now = SystemClock::new().now_ms();
        // 2020-01-01T00:00:00Z
        assert!(now > 1_577_836_800_000);
    }

    #[test]
    fn test_system_clock_never_goes_backwards() {
        let clock = SystemClock::new();
        assert_eq!(clock.clamp(5_000), 5_000);
        assert_eq!(clock.clamp(4_000), 5_000);
        assert_eq!(clock.clamp(5_001), 5_001);

        let first = clock.now_ms();
        assert!(clock.now_ms() >= first);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[test]
    fn test_manual_clock_step() {
        let clock = ManualClock::new(0).with_step(10);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 10);
        assert_eq!(clock.now_ms(), 20);
    }
}
