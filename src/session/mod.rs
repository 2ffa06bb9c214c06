//! # Session capability consumed by the fleet core.
//!
//! The core never speaks a client protocol itself. It asks a [`SessionFactory`]
//! to open one [`Session`] per connection attempt and learns about the
//! session's progress through the [`SessionSink`] handed to `open`.
//!
//! ## Architecture
//! ```text
//! FleetDriver ──open(OpenRequest, SessionSink)──► SessionFactory ──► Box<dyn Session>
//!      ▲                                                                  │
//!      └──── Signal::Session{ticket, SessionEvent} ◄── sink.emit(..) ─────┘
//! ```
//!
//! ## Rules
//! - `open` must not block; long work belongs in a spawned task.
//! - Every event is tagged with the attempt's ticket, so events of an abandoned
//!   attempt are discarded by the driver; implementations need not stop emitting
//!   after `close`.
//! - `send` fails with [`SessionError::NotReady`] unless the session is ready.
//!
//! ## Implementations
//! - [`TcpLineFactory`]: plain TCP, one text line per message.

mod tcp;

#[cfg(test)]
pub(crate) mod mock;

pub use tcp::TcpLineFactory;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::core::{Endpoint, Identity, Signal, Ticket};
use crate::error::SessionError;

/// Lifecycle notifications a session reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Transport-level connection established; login in progress.
    Connecting,
    /// Session is fully usable.
    Ready,
    /// Remote side closed the connection.
    Disconnected {
        /// Close reason, if known.
        reason: String,
    },
    /// The session failed.
    Fault {
        /// Error text.
        reason: String,
    },
    /// Inbound chat line (forwarded only for the designated listener).
    Chat {
        /// Author of the line.
        from: String,
        /// Message text.
        text: String,
    },
}

/// Parameters for opening one session.
#[derive(Clone, Debug)]
pub struct OpenRequest {
    /// Client name to log in with.
    pub identity: Identity,
    /// Server to connect to.
    pub endpoint: Endpoint,
    /// Transport-level connect timeout hint.
    pub connect_timeout: Option<Duration>,
    /// Whether this client is the fleet's designated chat listener.
    pub listener: bool,
}

/// Where a session reports its lifecycle events.
///
/// Cheap to clone; every clone reports for the same attempt.
#[derive(Clone, Debug)]
pub struct SessionSink {
    tx: mpsc::UnboundedSender<Signal>,
    ticket: Ticket,
    identity: Identity,
}

impl SessionSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Signal>, ticket: Ticket, identity: Identity) -> Self {
        Self {
            tx,
            ticket,
            identity,
        }
    }

    /// Reports an event. Returns `false` if the fleet driver is gone.
    pub fn emit(&self, event: SessionEvent) -> bool {
        self.tx
            .send(Signal::Session {
                ticket: self.ticket,
                identity: self.identity.clone(),
                event,
            })
            .is_ok()
    }

    /// Identity this sink reports for.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

/// One live connection attempt of one client.
pub trait Session: Send + 'static {
    /// Sends one outbound message.
    fn send(&mut self, text: &str) -> Result<(), SessionError>;

    /// Closes the session. Must be idempotent.
    fn close(&mut self);
}

/// Opens sessions for the fleet driver.
pub trait SessionFactory: Send + Sync + 'static {
    /// Starts connecting and returns the session handle immediately.
    fn open(&self, request: OpenRequest, sink: SessionSink) -> Box<dyn Session>;
}
