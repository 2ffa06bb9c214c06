//! Fleet lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to notifications emitted by the fleet driver.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the fleet driver (one task, so events are totally ordered by `seq`).
//! - **Consumers**: [`FleetController::subscribe`](crate::FleetController::subscribe)
//!   receivers and the [`SubscriberSet`](crate::SubscriberSet) listener.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
