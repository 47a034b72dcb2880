//! Time abstraction for testable timing operations.
//!
//! Delivery timestamps, replay windows, and retry schedules all flow
//! through the [`Clock`] trait so tests can control time deterministically.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};

/// Clock abstraction for time operations.
///
/// Production code uses [`RealClock`]; tests inject [`TestClock`] to
/// advance time without sleeping.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current system time.
    fn now_system(&self) -> SystemTime;

    /// Sleeps for the specified duration.
    ///
    /// Maps to `tokio::time::sleep` in production; test clocks advance
    /// virtual time and yield immediately.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Returns the current time as a UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.now_system())
    }

    /// Returns the current time as whole seconds since the Unix epoch.
    fn unix_timestamp(&self) -> i64 {
        self.now_system()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Real clock implementation using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Test clock for deterministic time control.
///
/// System time is tracked as nanoseconds since the Unix epoch and can be
/// advanced or jumped explicitly. `sleep` advances the clock and yields.
#[derive(Debug, Clone)]
pub struct TestClock {
    system_ns: Arc<AtomicU64>,
}

impl TestClock {
    /// Creates a test clock starting at the current time.
    pub fn new() -> Self {
        Self::with_start_time(SystemTime::now())
    }

    /// Creates a test clock starting at a specific time.
    pub fn with_start_time(start: SystemTime) -> Self {
        let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();
        let ns = u64::try_from(since_epoch.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        Self { system_ns: Arc::new(AtomicU64::new(ns)) }
    }

    /// Advances the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.system_ns.fetch_add(ns, Ordering::AcqRel);
    }

    /// Jumps the clock to a specific system time, forwards or backwards.
    pub fn jump_to(&self, time: SystemTime) {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let ns = u64::try_from(since_epoch.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.system_ns.store(ns, Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_system(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.system_ns.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_system_time() {
        let start = UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_system(), start);
        assert_eq!(clock.unix_timestamp(), 1_000);

        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now_system(), start + Duration::from_secs(60));
        assert_eq!(clock.unix_timestamp(), 1_060);
    }

    #[test]
    fn test_clock_jumps_backwards() {
        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(2_000));
        clock.jump_to(UNIX_EPOCH + Duration::from_secs(500));
        assert_eq!(clock.unix_timestamp(), 500);
    }

    #[tokio::test]
    async fn test_clock_sleep_advances_without_waiting() {
        let clock = TestClock::with_start_time(UNIX_EPOCH + Duration::from_secs(0));
        clock.sleep(Duration::from_secs(3_600)).await;
        assert_eq!(clock.unix_timestamp(), 3_600);
    }

    #[test]
    fn real_clock_tracks_unix_epoch() {
        let clock = RealClock::new();
        assert!(clock.unix_timestamp() > 1_700_000_000);
    }
}
