//! # First-connection retry budget.
//!
//! [`RetryPolicy`] bounds how many times a client may fail its *first*
//! connection before it is marked failed, and how long each attempt may take.
//! Reconnects of a client that has already been online are unbounded and only
//! use [`RetryPolicy::backoff`].

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Attempt budget, per-attempt timeout and backoff for one client.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Failed first-connection attempts after which the client is marked failed.
    ///
    /// Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Per-attempt timeout while the first connection is pending (`None` = no timeout).
    pub connect_timeout: Option<Duration>,
    /// Delay growth between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    /// Returns `max_attempts = 5`, `connect_timeout = 20s`, default backoff.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            connect_timeout: Some(Duration::from_secs(20)),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Returns `true` once `failures` has used up the budget.
    #[inline]
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts.max(1)
    }

    /// Delay before retry number `failures` (1-based): `first × factor^(failures-1)`, capped.
    #[inline]
    pub fn retry_delay(&self, failures: u32) -> Duration {
        self.backoff.next(failures.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_behaves_like_one() {
        let p = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(p.is_exhausted(1));
    }

    #[test]
    fn retry_delay_is_one_based() {
        let p = RetryPolicy::default();
        assert_eq!(p.retry_delay(1), Duration::from_millis(2000));
        assert_eq!(p.retry_delay(2), Duration::from_millis(3000));
    }
}
