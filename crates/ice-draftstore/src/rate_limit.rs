//! A per-`(token, route)` sliding-window rate limiter, grounded on
//! `drafts.py`'s in-process limiter: 5 requests per 10-second window.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::DraftStoreError;

const DEFAULT_WINDOW: Duration = Duration::from_secs(10);
const DEFAULT_MAX_REQUESTS: usize = 5;

/// Tracks request timestamps per `(token, route)` key and rejects once the
/// window fills.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    buckets: DashMap<(String, String), Vec<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_REQUESTS)
    }
}

impl RateLimiter {
    /// Build a limiter with a custom window and request budget.
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            buckets: DashMap::new(),
        }
    }

    /// Record one request for `(token, route)`, rejecting if the window is
    /// already full.
    pub fn check(&self, token: &str, route: &str) -> Result<(), DraftStoreError> {
        let key = (token.to_owned(), route.to_owned());
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key).or_default();
        bucket.retain(|seen| now.duration_since(*seen) < self.window);
        if bucket.len() >= self.max_requests {
            return Err(DraftStoreError::RateLimited);
        }
        bucket.push(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_budget() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 2);
        limiter.check("token-a", "/drafts/x").unwrap();
        limiter.check("token-a", "/drafts/x").unwrap();
    }

    #[test]
    fn rejects_once_the_budget_is_exhausted() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 1);
        limiter.check("token-a", "/drafts/x").unwrap();
        let err = limiter.check("token-a", "/drafts/x").unwrap_err();
        assert!(matches!(err, DraftStoreError::RateLimited));
    }

    #[test]
    fn distinct_keys_have_independent_budgets() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 1);
        limiter.check("token-a", "/drafts/x").unwrap();
        limiter.check("token-b", "/drafts/x").unwrap();
        limiter.check("token-a", "/drafts/y").unwrap();
    }
}
