//! Error types used by the fleet runtime and by sessions.
//!
//! This module defines two main error enums:
//!
//! - [`ControlError`]: errors returned by [`FleetController`](crate::FleetController) operations.
//! - [`SessionError`]: failures of a single client session or connection attempt.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! Per-client failures are recovered by the retry policy and never surface as a
//! `ControlError`; only operator-facing conditions do.

use std::time::Duration;
use thiserror::Error;

use crate::core::Identity;

/// # Errors returned by the fleet controller facade.
///
/// None of these are fatal to the fleet: the controller keeps running and the
/// caller decides how to report the condition.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// A fleet is already starting or running; stop it first.
    #[error("fleet already active")]
    AdmissionRejected,

    /// Requested fleet size is outside `1..=max`.
    #[error("invalid fleet size {count} (allowed 1..={max})")]
    InvalidFleetSize {
        /// Requested number of clients.
        count: usize,
        /// Configured upper bound.
        max: usize,
    },

    /// No client with this identity exists in the current generation.
    #[error("client {identity} not found")]
    NotFound {
        /// Identity that was looked up.
        identity: Identity,
    },

    /// The client exists but is not online (or its session refused the message).
    #[error("client {identity} unavailable")]
    Unavailable {
        /// Identity of the offline client.
        identity: Identity,
    },

    /// The fleet driver has shut down and no longer accepts commands.
    #[error("fleet driver closed")]
    Closed,
}

impl ControlError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fleetvisor::ControlError;
    ///
    /// assert_eq!(ControlError::AdmissionRejected.as_label(), "admission_rejected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ControlError::AdmissionRejected => "admission_rejected",
            ControlError::InvalidFleetSize { .. } => "invalid_fleet_size",
            ControlError::NotFound { .. } => "not_found",
            ControlError::Unavailable { .. } => "unavailable",
            ControlError::Closed => "driver_closed",
        }
    }
}

/// # Failures of a single client session.
///
/// Produced by [`Session`](crate::Session) implementations and by the state
/// machine when a connection attempt times out or the retry budget runs out.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The connection attempt did not become ready in time.
    #[error("connect timed out after {timeout:?}")]
    Timeout {
        /// The per-attempt timeout that was exceeded.
        timeout: Duration,
    },

    /// The session reported an error.
    #[error("session fault: {reason}")]
    Fault {
        /// Underlying error message.
        reason: String,
    },

    /// The remote side closed the connection.
    #[error("disconnected: {reason}")]
    Disconnected {
        /// Close reason, if the transport reported one.
        reason: String,
    },

    /// First-connection retries were exhausted; the client is marked failed.
    #[error("retry budget exhausted after {attempts} attempts")]
    RetryExhausted {
        /// Number of failed attempts.
        attempts: u32,
    },

    /// `send` was called before the session became ready.
    #[error("session not ready")]
    NotReady,

    /// The session was closed locally.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fleetvisor::SessionError;
    /// use std::time::Duration;
    ///
    /// let err = SessionError::Timeout { timeout: Duration::from_secs(20) };
    /// assert_eq!(err.as_label(), "session_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::Timeout { .. } => "session_timeout",
            SessionError::Fault { .. } => "session_fault",
            SessionError::Disconnected { .. } => "session_disconnected",
            SessionError::RetryExhausted { .. } => "retry_exhausted",
            SessionError::NotReady => "session_not_ready",
            SessionError::Closed => "session_closed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            SessionError::Fault { reason } => format!("fault: {reason}"),
            SessionError::Disconnected { reason } => format!("disconnected: {reason}"),
            SessionError::RetryExhausted { attempts } => format!("gave up after {attempts}"),
            SessionError::NotReady => "not ready".to_string(),
            SessionError::Closed => "closed".to_string(),
        }
    }

    /// Indicates whether the failure consumes a retry of the first connection.
    ///
    /// Returns `true` for [`SessionError::Timeout`], [`SessionError::Fault`] and
    /// [`SessionError::Disconnected`].
    pub fn counts_as_attempt(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout { .. }
                | SessionError::Fault { .. }
                | SessionError::Disconnected { .. }
        )
    }
}

/// Error parsing a `host[:port]` endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Host part is empty.
    #[error("endpoint host is empty")]
    EmptyHost,

    /// Port part is not a valid `u16`.
    #[error("invalid port {port:?}")]
    InvalidPort {
        /// The offending port text.
        port: String,
    },

    /// `[` of an IPv6 literal without the closing `]`.
    #[error("unclosed '[' in IPv6 address")]
    UnclosedBracket,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let id = Identity::from("bot_001");
        assert_eq!(ControlError::NotFound { identity: id.clone() }.as_label(), "not_found");
        assert_eq!(ControlError::Unavailable { identity: id }.as_label(), "unavailable");
        assert_eq!(SessionError::RetryExhausted { attempts: 5 }.as_label(), "retry_exhausted");
    }

    #[test]
    fn only_connection_failures_count_as_attempts() {
        assert!(SessionError::Fault { reason: "refused".into() }.counts_as_attempt());
        assert!(SessionError::Timeout { timeout: Duration::from_secs(1) }.counts_as_attempt());
        assert!(!SessionError::NotReady.counts_as_attempt());
        assert!(!SessionError::Closed.counts_as_attempt());
    }

    #[test]
    fn display_includes_identity() {
        let err = ControlError::NotFound { identity: Identity::from("alice") };
        assert_eq!(err.to_string(), "client alice not found");
    }
}
