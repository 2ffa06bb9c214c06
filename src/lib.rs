//! # fleetvisor
//!
//! **Fleetvisor** launches and supervises a fleet of identical client sessions
//! against one server: bounded-concurrency admission of first connections,
//! per-client retry with exponential backoff, unbounded reconnects after a
//! drop, one-shot fleet readiness, and operator commands (kick, restore,
//! send, broadcast) that act on a live fleet.
//!
//! The crate does not speak any particular client protocol. Sessions come from
//! a [`SessionFactory`]; [`TcpLineFactory`] is the bundled line-oriented TCP one.
//!
//! ## Architecture
//! ```text
//!      operator / CLI
//!            │ start_fleet, stop_fleet, kick, restore, send, broadcast, snapshot
//!            ▼
//! ┌─────────────────────┐   Command + oneshot reply
//! │   FleetController   │ ─────────────────────────────┐
//! └─────────────────────┘                              ▼
//!                               ┌───────────────────────────────────────────┐
//!   SessionSink / timers ─────► │ FleetDriver (single task, owns all state) │
//!        Signal (ticketed)      │  - FleetGeneration (records + flags)      │
//!                               │  - ConnectionScheduler (admission queue)  │
//!                               │  - ReadinessAggregator (one settlement)   │
//!                               └─────┬──────────────────────────────┬──────┘
//!                                     │ open(OpenRequest, sink)      │ publish(Event)
//!                                     ▼                              ▼
//!                              SessionFactory                       Bus
//!                                                                    │
//!                                                        ┌───────────┴──────────┐
//!                                                        ▼                      ▼
//!                                            subscriber listener      subscribe() receivers
//!                                                        │
//!                                                  SubscriberSet ──► LogWriter, custom ...
//! ```
//!
//! ### Client lifecycle
//! ```text
//! Queued ──admitted──► Connecting ──ready──► Online ──drop──► Reconnecting ──ready──► Online
//!                        │    ▲                                  │     ▲
//!                 failure│    │retry (min(2s·1.5^(n-1), 10s))    └─────┘ carried backoff
//!                        ▼    │
//!                   attempts exhausted ──► Failed
//!
//! kick / restore (any state) ──► Idle   (restore recreates the client after 1s)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                               |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------------|
//! | **Control**       | Start/stop fleets and act on individual clients.              | [`FleetBuilder`], [`FleetController`]            |
//! | **Sessions**      | Pluggable client connections.                                  | [`SessionFactory`], [`Session`], [`SessionSink`] |
//! | **Policies**      | Retry budget, per-attempt timeout, backoff and jitter.         | [`RetryPolicy`], [`BackoffPolicy`]               |
//! | **Observability** | Lifecycle events and subscribers.                              | [`Event`], [`EventKind`], [`Subscribe`]          |
//! | **Errors**        | Typed errors for control operations and sessions.              | [`ControlError`], [`SessionError`]               |
//! | **Configuration** | Centralized runtime settings.                                  | [`FleetConfig`]                                  |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that renders events through `tracing`.
//! - `cli`: builds the `fleetctl` operator binary.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use fleetvisor::{Endpoint, FleetBuilder, FleetConfig, Subscribe, TcpLineFactory};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(fleetvisor::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let fleet = FleetBuilder::new(FleetConfig::default(), Arc::new(TcpLineFactory::new()))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let endpoint: Endpoint = "localhost:25565".parse()?;
//!     fleet.start_fleet(5, "bot_", endpoint).await?;
//!
//!     let mut events = fleet.subscribe();
//!     while let Ok(ev) = events.recv().await {
//!         if ev.kind == fleetvisor::EventKind::FleetSettled {
//!             break;
//!         }
//!     }
//!     fleet.broadcast("hello from the fleet").await?;
//!     fleet.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod session;
mod subscribers;

// ---- Public re-exports ----

pub use config::FleetConfig;
pub use core::{
    ClientSnapshot, ClientState, DEFAULT_PORT, Endpoint, FleetBuilder, FleetController,
    FleetSnapshot, Identity, Settlement, Ticket,
};
pub use error::{ControlError, EndpointError, SessionError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use session::{OpenRequest, Session, SessionEvent, SessionFactory, SessionSink, TcpLineFactory};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: built-in tracing subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
