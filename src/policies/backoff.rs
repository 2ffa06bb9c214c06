//! # Backoff policy for reconnecting clients.
//!
//! [`BackoffPolicy`] controls how reconnect delays grow after repeated failures.
//! It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! Two growth modes are used by the client state machine:
//! - **Indexed** ([`BackoffPolicy::next`]): the delay for retry `n` (0-indexed) is
//!   `first × factor^n`, clamped to `max`. Used while a client is still trying
//!   to connect for the first time.
//! - **Carried** ([`BackoffPolicy::grow`]): the delay is multiplied by `factor` each
//!   time an already-connected client drops again, clamped to `max`, and reset
//!   to `first` after the next successful connection.
//!
//! Jitter is applied only to the delay actually slept ([`BackoffPolicy::jittered`]);
//! the carried base never absorbs jitter output.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use fleetvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(2000),
//!     max: Duration::from_secs(10),
//!     factor: 1.5,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(2000));
//! assert_eq!(backoff.next(3), Duration::from_millis(6750));
//! assert_eq!(backoff.next(4), Duration::from_secs(10));
//! assert_eq!(backoff.grow(Duration::from_millis(3000)), Duration::from_millis(4500));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to slept delays.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a strategy with:
    /// - `first = 2000ms`;
    /// - `factor = 1.5`;
    /// - `max = 10s`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(2000),
            max: Duration::from_secs(10),
            factor: 1.5,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the un-jittered delay for the given retry index (0-indexed).
    ///
    /// The delay is `first × factor^attempt`, clamped to [`BackoffPolicy::max`].
    /// Non-finite or negative intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        self.clamp_secs(self.first.as_secs_f64() * self.factor.powi(exp))
    }

    /// Grows a carried delay by one step: `min(current × factor, max)`.
    pub fn grow(&self, current: Duration) -> Duration {
        self.clamp_secs(current.as_secs_f64() * self.factor)
    }

    /// Applies the configured jitter to a delay that is about to be slept.
    #[inline]
    pub fn jittered(&self, delay: Duration) -> Duration {
        self.jitter.apply(delay)
    }

    fn clamp_secs(&self, secs: f64) -> Duration {
        if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            // Round to whole milliseconds so 1.5× steps stay exact.
            Duration::from_millis((secs * 1000.0).round() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(2000),
            max: Duration::from_millis(10_000),
            factor: 1.5,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn test_first_connection_sequence() {
        let p = policy();
        let delays: Vec<u64> = (0..5).map(|n| p.next(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![2000, 3000, 4500, 6750, 10_000]);
    }

    #[test]
    fn test_grow_is_non_decreasing_and_capped() {
        let p = policy();
        let mut current = p.first;
        let mut seen = vec![current];
        for _ in 0..8 {
            current = p.grow(current);
            seen.push(current);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), Duration::from_millis(10_000));
        assert_eq!(seen[1], Duration::from_millis(3000));
    }

    #[test]
    fn test_constant_factor() {
        let p = BackoffPolicy {
            factor: 1.0,
            ..policy()
        };
        for attempt in 0..10 {
            assert_eq!(p.next(attempt), Duration::from_millis(2000));
        }
        assert_eq!(p.grow(p.first), p.first);
    }

    #[test]
    fn test_first_exceeds_max() {
        let p = BackoffPolicy {
            first: Duration::from_secs(20),
            ..policy()
        };
        assert_eq!(p.next(0), Duration::from_millis(10_000));
    }

    #[test]
    fn test_huge_attempt_clamps_to_max() {
        assert_eq!(policy().next(u32::MAX), Duration::from_millis(10_000));
    }

    #[test]
    fn test_equal_jitter_stays_within_half() {
        let p = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..policy()
        };
        for _ in 0..50 {
            let d = p.jittered(Duration::from_millis(4000));
            assert!(d >= Duration::from_millis(2000) && d <= Duration::from_millis(4000));
        }
    }
}
