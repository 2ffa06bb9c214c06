use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    config::FleetConfig,
    events::Bus,
    session::SessionFactory,
    subscribers::{Subscribe, SubscriberSet},
};

use super::{controller::FleetController, driver::FleetDriver};

/// Builder for a running fleet: driver task, event bus and subscribers.
pub struct FleetBuilder {
    cfg: FleetConfig,
    factory: Arc<dyn SessionFactory>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl FleetBuilder {
    /// Creates a builder that opens sessions through `factory`.
    pub fn new(cfg: FleetConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            cfg,
            factory,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive fleet events through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Spawns the driver (and the subscriber listener) and returns the controller.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> FleetController {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let token = CancellationToken::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(self.cfg.command_capacity_clamped());
        let (sig_tx, sig_rx) = mpsc::unbounded_channel();

        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            subscriber_listener(bus.subscribe(), set, token.clone());
        }

        let driver = FleetDriver::new(self.cfg, self.factory, bus.clone(), token.clone(), sig_tx);
        tokio::spawn(driver.run(cmd_rx, sig_rx));

        FleetController::new(cmd_tx, bus, token)
    }
}

/// Forwards bus events to the subscriber set until the fleet shuts down.
fn subscriber_listener(
    mut rx: broadcast::Receiver<crate::events::Event>,
    set: SubscriberSet,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = token.cancelled() => {
                    // Deliver what the driver published while stopping.
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    });
}
