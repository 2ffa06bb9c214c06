//! # Fleet runtime configuration.
//!
//! Provides [`FleetConfig`], the centralized settings for the fleet driver.
//!
//! ## Sentinel values
//! - `concurrency_limit = 0` → treated as 1 (admission never fully disabled)
//! - `spawn_stagger = 0s` → all records of a generation are created at once
//! - `retry.connect_timeout = None` → attempts never time out locally

use std::time::Duration;

use crate::policies::RetryPolicy;

/// Global configuration for the fleet driver.
///
/// ## Field semantics
/// - `concurrency_limit`: first connections allowed in flight at once
/// - `retry`: attempt budget, per-attempt timeout and backoff
/// - `spawn_stagger`: spacing between record creation during `start_fleet`
/// - `restore_settle`: pause between quitting and recreating a restored client
/// - `max_fleet_size`: upper bound accepted by `start_fleet`
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
/// - `command_capacity`: controller command queue size
#[derive(Clone, Debug, PartialEq)]
pub struct FleetConfig {
    /// Maximum number of first connections awaiting an outcome at the same time.
    pub concurrency_limit: usize,

    /// First-connection retry budget and reconnect backoff.
    pub retry: RetryPolicy,

    /// Delay between creating consecutive clients of a new generation.
    pub spawn_stagger: Duration,

    /// Settling interval between quitting a client and recreating it on `restore`.
    pub restore_settle: Duration,

    /// Largest fleet `start_fleet` accepts.
    pub max_fleet_size: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Capacity of the controller → driver command queue.
    pub command_capacity: usize,
}

impl FleetConfig {
    /// Returns the admission limit, never below 1.
    #[inline]
    pub fn admission_limit(&self) -> usize {
        self.concurrency_limit.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a command queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn command_capacity_clamped(&self) -> usize {
        self.command_capacity.max(1)
    }
}

impl Default for FleetConfig {
    /// Default configuration:
    ///
    /// - `concurrency_limit = 3`
    /// - `retry = RetryPolicy::default()` (5 attempts, 20s timeout, 2s×1.5 up to 10s)
    /// - `spawn_stagger = 100ms`
    /// - `restore_settle = 1s`
    /// - `max_fleet_size = 100`
    /// - `bus_capacity = 1024`
    /// - `command_capacity = 64`
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            retry: RetryPolicy::default(),
            spawn_stagger: Duration::from_millis(100),
            restore_settle: Duration::from_secs(1),
            max_fleet_size: 100,
            bus_capacity: 1024,
            command_capacity: 64,
        }
    }
}
