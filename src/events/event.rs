//! # Lifecycle events emitted by the fleet driver.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Fleet events**: generation start/stop and the one-shot settlement summary
//! - **Admission events**: queueing and admission of first connections
//! - **Client events**: state transitions, timeouts, backoff, retry exhaustion
//! - **Traffic events**: outbound messages and chat seen by the listener
//!
//! The [`Event`] struct carries the metadata an external logger needs to render a
//! line (identity, old state, new state, reason). The crate itself never formats
//! events for humans except in the optional [`LogWriter`](crate::LogWriter).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use fleetvisor::{ClientState, Event, EventKind};
//!
//! let ev = Event::new(EventKind::StateChanged)
//!     .with_identity("bot_001")
//!     .with_transition(ClientState::Connecting, ClientState::Online)
//!     .with_reason("ready");
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.identity.as_deref(), Some("bot_001"));
//! assert_eq!(ev.to, Some(ClientState::Online));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::{ClientState, Identity};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of fleet events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and drop reason
    SubscriberOverflow,

    // === Fleet events ===
    /// A new generation is starting.
    ///
    /// Sets:
    /// - `total`: requested fleet size
    /// - `reason`: endpoint as `host:port`
    FleetStarting,

    /// The fleet was stopped and its generation discarded.
    ///
    /// Sets:
    /// - `total`: number of records that were quit
    FleetStopped,

    /// Every client settled; emitted exactly once per generation.
    ///
    /// Sets:
    /// - `online`: clients online at settlement
    /// - `total`: generation size
    /// - `reason`: `all_online`, `partial` or `total_failure`
    FleetSettled,

    // === Admission events ===
    /// A client record was created and put in the admission queue.
    ///
    /// Sets:
    /// - `identity`
    /// - `online`: records created so far
    /// - `total`: generation size
    ClientQueued,

    /// A queued client was admitted and starts its first connection.
    ///
    /// Sets:
    /// - `identity`
    /// - `active`: admitted first connections in flight (after admission)
    ClientAdmitted,

    // === Client events ===
    /// A client changed state.
    ///
    /// Sets:
    /// - `identity`, `from`, `to`
    /// - `reason`: trigger (`ready`, fault text, `kick`, ...)
    StateChanged,

    /// A first-connection attempt exceeded its timeout.
    ///
    /// Sets:
    /// - `identity`, `attempt`
    /// - `timeout_ms`: configured per-attempt timeout
    TimeoutHit,

    /// A reconnect was scheduled.
    ///
    /// Sets:
    /// - `identity`
    /// - `attempt`: failed attempts so far (first connection) or 0 for reconnects
    /// - `delay_ms`: delay before the next attempt
    /// - `reason`: last failure message
    BackoffScheduled,

    /// First-connection retries are exhausted; the client is failed for this generation.
    ///
    /// Sets:
    /// - `identity`, `attempt`
    RetryExhausted,

    /// A client record was replaced by a fresh one (`restore`).
    ///
    /// Sets:
    /// - `identity`
    ClientRestored,

    // === Traffic events ===
    /// A message was handed to an online client's session.
    ///
    /// Sets:
    /// - `identity`, `text`
    MessageSent,

    /// The designated listener received a chat line from another participant.
    ///
    /// Sets:
    /// - `identity`: listener identity
    /// - `reason`: author
    /// - `text`: message
    ChatReceived,
}

/// Fleet event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Client the event refers to, if any.
    pub identity: Option<Identity>,
    /// State before a transition.
    pub from: Option<ClientState>,
    /// State after a transition.
    pub to: Option<ClientState>,
    /// Human-readable reason (errors, triggers, endpoint, ...).
    pub reason: Option<Arc<str>>,
    /// Message payload for traffic events.
    pub text: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Per-attempt timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Admitted first connections in flight.
    pub active: Option<u32>,
    /// Online (or created) count for fleet-level events.
    pub online: Option<u32>,
    /// Generation size for fleet-level events.
    pub total: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            identity: None,
            from: None,
            to: None,
            reason: None,
            text: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            active: None,
            online: None,
            total: None,
        }
    }

    /// Attaches a client identity.
    #[inline]
    pub fn with_identity(mut self, identity: impl Into<Identity>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Attaches a state transition.
    #[inline]
    pub fn with_transition(mut self, from: ClientState, to: ClientState) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a message payload.
    #[inline]
    pub fn with_text(mut self, text: impl Into<Arc<str>>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches the number of admitted first connections in flight.
    #[inline]
    pub fn with_active(mut self, active: usize) -> Self {
        self.active = Some(compact_count(active));
        self
    }

    /// Attaches online/total counts.
    #[inline]
    pub fn with_counts(mut self, online: usize, total: usize) -> Self {
        self.online = Some(compact_count(online));
        self.total = Some(compact_count(total));
        self
    }

    /// Attaches a total count only.
    #[inline]
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(compact_count(total));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// Returns `true` for events produced by the subscriber machinery itself.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

fn compact_count(n: usize) -> u32 {
    n.min(u32::MAX as usize) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::FleetStopped);
        let b = Event::new(EventKind::FleetStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_stored_in_millis() {
        let ev = Event::new(EventKind::BackoffScheduled).with_delay(Duration::from_millis(4500));
        assert_eq!(ev.delay_ms, Some(4500));
    }

    #[test]
    fn subscriber_events_are_internal() {
        assert!(Event::subscriber_overflow("log", "full").is_internal());
        assert!(!Event::new(EventKind::ClientAdmitted).is_internal());
    }
}
