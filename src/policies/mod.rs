//! Retry and reconnect policies.
//!
//! This module groups the knobs that control **how often** a client retries its
//! first connection and **how long** it waits between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`]   attempt budget and per-attempt timeout for the first connection
//! - [`BackoffPolicy`] how delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to spread reconnects of many clients
//!
//! ## Quick wiring
//! ```text
//! FleetConfig { retry: RetryPolicy { max_attempts, backoff, connect_timeout }, .. }
//!      └─► core::client::ClientStateMachine uses:
//!           - backoff.next(retry - 1) for first-connection retries
//!           - backoff.grow(current) for repeated drops of an online client
//!           - max_attempts to decide when a first connection has failed for good
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=2000ms, factor=1.5, max=10s, jitter=None.
//! - `RetryPolicy::default()` → max_attempts=5, connect_timeout=20s.

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
