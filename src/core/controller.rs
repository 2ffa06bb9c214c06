//! # FleetController: async facade over the fleet driver.
//!
//! Every operation is a message to the driver task plus a oneshot reply, so
//! callers never touch fleet state directly and operations are applied in the
//! order they are received.
//!
//! ```text
//! caller ──start_fleet()──► [command queue] ──► FleetDriver ──► reply
//!        ◄──────────────────────── Result ◄──────────────────────┘
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use fleetvisor::{Endpoint, FleetBuilder, FleetConfig, TcpLineFactory};
//!
//! # async fn demo() -> Result<(), fleetvisor::ControlError> {
//! let fleet = FleetBuilder::new(FleetConfig::default(), Arc::new(TcpLineFactory::new())).build();
//! fleet.start_fleet(5, "bot_", Endpoint::new("localhost", 25565)).await?;
//! fleet.broadcast("hello").await?;
//! fleet.stop_fleet().await;
//! # Ok(())
//! # }
//! ```

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ControlError;
use crate::events::{Bus, Event};

use super::driver::Command;
use super::generation::FleetSnapshot;
use super::types::{Endpoint, Identity};

/// Cloneable handle for commanding a fleet.
#[derive(Clone)]
pub struct FleetController {
    tx: mpsc::Sender<Command>,
    bus: Bus,
    token: CancellationToken,
}

impl FleetController {
    pub(crate) fn new(tx: mpsc::Sender<Command>, bus: Bus, token: CancellationToken) -> Self {
        Self { tx, bus, token }
    }

    /// Starts a generation of `count` clients named `{prefix}001..`.
    ///
    /// Records are created (staggered) in the background; the call returns once
    /// the generation is accepted. Fails with [`ControlError::AdmissionRejected`]
    /// while a fleet is starting or running.
    pub async fn start_fleet(
        &self,
        count: usize,
        prefix: impl Into<String>,
        endpoint: Endpoint,
    ) -> Result<(), ControlError> {
        let prefix = prefix.into();
        self.request(|reply| Command::Start {
            count,
            prefix,
            endpoint,
            reply,
        })
        .await?
    }

    /// Quits every client and discards the generation. Always succeeds.
    pub async fn stop_fleet(&self) {
        let _ = self.request(|reply| Command::Stop { reply }).await;
    }

    /// Manually quits one client; it will not reconnect on its own.
    pub async fn kick(&self, identity: impl Into<Identity>) -> Result<(), ControlError> {
        let identity = identity.into();
        self.request(|reply| Command::Kick { identity, reply })
            .await?
    }

    /// Quits one client and, after the settling interval, recreates it under the same name.
    pub async fn restore(&self, identity: impl Into<Identity>) -> Result<(), ControlError> {
        let identity = identity.into();
        self.request(|reply| Command::Restore { identity, reply })
            .await?
    }

    /// Sends a message through one online client.
    pub async fn send(
        &self,
        identity: impl Into<Identity>,
        text: impl Into<String>,
    ) -> Result<(), ControlError> {
        let identity = identity.into();
        let text = text.into();
        self.request(|reply| Command::Send {
            identity,
            text,
            reply,
        })
        .await?
    }

    /// Sends a message through every online client. Returns the clients it was handed to.
    pub async fn broadcast(&self, text: impl Into<String>) -> Result<Vec<Identity>, ControlError> {
        let text = text.into();
        self.request(|reply| Command::Broadcast { text, reply })
            .await
    }

    /// Point-in-time view of the fleet.
    pub async fn snapshot(&self) -> Result<FleetSnapshot, ControlError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Stops the fleet and terminates the driver. Later calls fail with [`ControlError::Closed`].
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
        self.token.cancel();
    }

    /// `true` once the driver has terminated.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| ControlError::Closed)?;
        rx.await.map_err(|_| ControlError::Closed)
    }
}
