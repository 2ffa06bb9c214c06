//! # Event subscribers for the fleet runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the optional built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! FleetDriver ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                       │
//!                                                  ┌─────────┬──────────┼─────────┐
//!                                                  ▼         ▼          ▼         ▼
//!                                              LogWriter  Metrics    Custom      ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use fleetvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Settlements;
//!
//! #[async_trait]
//! impl Subscribe for Settlements {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::FleetSettled {
//!             // page someone on total_failure
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "settlements"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
