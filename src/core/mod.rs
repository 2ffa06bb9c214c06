//! Runtime core: fleet orchestration and client lifecycle.
//!
//! The public surface of this module is [`FleetController`] (built with
//! [`FleetBuilder`]) plus the value types it hands out. Everything mutable
//! lives inside a single driver task; the controller talks to it over a
//! command queue.
//!
//! Internal modules:
//! - [`types`]: identities, endpoints and attempt tickets;
//! - [`client`]: per-client state machine (`(state, input) -> effects`);
//! - [`scheduler`]: bounded admission queue for first connections;
//! - [`readiness`]: one-shot settlement of a generation;
//! - [`generation`]: roster and fleet flags, plus snapshots;
//! - [`driver`]: the task that owns all of the above and executes effects;
//! - [`builder`] / [`controller`]: construction and the async facade.

mod builder;
mod client;
mod controller;
mod driver;
mod generation;
mod readiness;
mod scheduler;
mod types;

pub use builder::FleetBuilder;
pub use client::ClientState;
pub use controller::FleetController;
pub use generation::{ClientSnapshot, FleetSnapshot};
pub use readiness::Settlement;
pub use types::{DEFAULT_PORT, Endpoint, Identity, Ticket};

pub(crate) use driver::Signal;
