//! Per-node retry with exponential backoff.
//!
//! Delay formula is `backoff_seconds * 2^attempt`, matching the engine's
//! execution loop contract exactly (unlike a generic jittered-backoff
//! strategy, there is no randomisation here: retries must be
//! deterministically reproducible in tests and replay).

use std::time::Duration;

/// A node's retry configuration, taken directly from its `NodeSpec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try.
    pub retries: u32,
    /// Base delay, seconds.
    pub backoff_seconds: f64,
}

impl RetryPolicy {
    /// Delay before retry attempt `attempt` (1-indexed: the delay before
    /// the first retry is `attempt = 1`, using exponent `attempt - 1` so
    /// the first retry is exactly `backoff_seconds`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let seconds = self.backoff_seconds * 2f64.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Whether `attempt` (the attempt about to be made, 1-indexed) is
    /// still within budget.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.retries
    }
}
