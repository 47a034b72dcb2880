//! Exponential backoff policy for failed deliveries.
//!
//! The backoff schedule is a pure function of the attempt number, measured
//! from the failed attempt rather than the original send. No jitter: the
//! per-tenant delivery volume is low and the schedule is part of the
//! documented contract (60s, 120s, 240s for the default policy).

use std::time::Duration;

use chrono::{DateTime, Utc};
use hookline_core::MAX_DELIVERY_ATTEMPTS;

/// Retry policy for webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum delivery attempts, including the initial send.
    pub max_attempts: u32,

    /// Base delay for exponential backoff calculation.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_DELIVERY_ATTEMPTS,
            base_delay: Duration::from_secs(crate::DEFAULT_BASE_DELAY_SECONDS),
        }
    }
}

impl RetryPolicy {
    /// Computes the backoff delay after a given failed attempt (1-based).
    ///
    /// `delay(attempt) = base_delay * 2^(attempt - 1)`, so the default
    /// policy yields 60s, 120s, 240s for attempts 1, 2, 3.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay * 2u32.saturating_pow(exponent)
    }

    /// Computes when the next attempt should run after a failure.
    ///
    /// Returns `None` once the attempt cap is reached; the failure is then
    /// terminal and the entry must keep `next_retry_at = None`.
    pub fn next_retry_at(&self, attempt: u32, failed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if attempt >= self.max_attempts {
            return None;
        }

        chrono::Duration::from_std(self.backoff_delay(attempt))
            .ok()
            .map(|delay| failed_at + delay)
    }
}
