//! # Event subscriber trait.
//!
//! [`Subscribe`] is the hook for consuming fleet events outside the driver:
//! rendering log lines, exporting metrics, bridging listener chat elsewhere.
//!
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_event()
//!                                    └─► panic caught → EventKind::SubscriberPanicked
//! ```
//!
//! ## Rules
//! - Events arrive in publication order, one at a time, per subscriber.
//! - A full queue drops the event for that subscriber only and is reported as
//!   `EventKind::SubscriberOverflow`.
//! - A subscriber can never stall the driver or another subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use fleetvisor::{Event, EventKind, Subscribe};
//!
//! struct Chat;
//!
//! #[async_trait]
//! impl Subscribe for Chat {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::ChatReceived {
//!             // forward to a chat bridge
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "chat" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Consumer of fleet events.
///
/// Implementations should use async I/O and handle their own errors; a panic
/// is caught, reported, and the worker moves on to the next event.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event on the subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic reports.
    ///
    /// The default is `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Queue capacity for this subscriber (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
