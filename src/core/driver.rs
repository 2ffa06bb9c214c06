//! # FleetDriver: the task that owns every piece of mutable fleet state.
//!
//! Commands from [`FleetController`](super::FleetController) and signals from
//! sessions and timers are processed one at a time by a single task, so there
//! is no locking anywhere in the core. Every state change goes through
//! [`ClientStateMachine::handle`] and the returned [`Effect`]s are executed here.
//!
//! ## Architecture
//! ```text
//!  FleetController ──Command(+oneshot reply)──┐
//!                                             ▼
//!  SessionSink ──Signal::Session──┐     ┌──────────────┐    open()    ┌────────────────┐
//!  timers ──────Signal::Timer─────┼───► │  FleetDriver │ ───────────► │ SessionFactory │
//!  stagger ─────Signal::Spawn─────┤     │  (one task)  │              └────────────────┘
//!  restore ─────Signal::Restore───┘     └──────┬───────┘
//!                                              │ publish(Event)
//!                                              ▼
//!                                             Bus
//! ```
//!
//! ## Rules
//! - Signals are drained before commands (`biased` select), so a command never
//!   observes a state that already-delivered session events would change.
//! - Every deferred callback carries a [`Ticket`]; callbacks whose ticket no
//!   longer matches the current generation/incarnation/epoch are dropped.
//! - `stop` and `start` discard the whole generation in one assignment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::FleetConfig;
use crate::error::ControlError;
use crate::events::{Bus, Event, EventKind};
use crate::session::{OpenRequest, SessionEvent, SessionFactory, SessionSink};

use super::client::{ClientState, ClientStateMachine, Effect, Input};
use super::generation::{FleetGeneration, FleetSnapshot};
use super::readiness::{ReadinessAggregator, Settlement};
use super::scheduler::{AdmissionEntry, ConnectionScheduler};
use super::types::{Endpoint, Identity, Ticket};

/// Deferred callback kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// Per-attempt connect timeout.
    AttemptTimeout,
    /// Scheduled retry or reconnect.
    RetryDue,
}

/// Asynchronous inputs delivered to the driver.
#[derive(Debug)]
pub(crate) enum Signal {
    /// A session reported progress.
    Session {
        ticket: Ticket,
        identity: Identity,
        event: SessionEvent,
    },
    /// A timer armed for an attempt expired.
    Timer { ticket: Ticket, kind: TimerKind },
    /// Staggered creation of the `index`-th record (0-based) of a generation.
    Spawn { generation: u64, index: usize },
    /// Settling interval of a restore elapsed.
    Restore {
        generation: u64,
        identity: Identity,
        incarnation: u64,
    },
}

/// Requests sent by the controller facade.
pub(crate) enum Command {
    Start {
        count: usize,
        prefix: String,
        endpoint: Endpoint,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Kick {
        identity: Identity,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Restore {
        identity: Identity,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Send {
        identity: Identity,
        text: String,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Broadcast {
        text: String,
        reply: oneshot::Sender<Vec<Identity>>,
    },
    Snapshot {
        reply: oneshot::Sender<FleetSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Single owner of the generation, the scheduler and the aggregator.
pub(crate) struct FleetDriver {
    cfg: FleetConfig,
    factory: Arc<dyn SessionFactory>,
    bus: Bus,
    token: CancellationToken,
    signals: mpsc::UnboundedSender<Signal>,

    generation: FleetGeneration,
    scheduler: ConnectionScheduler,
    readiness: ReadinessAggregator,
    prefix: String,
    next_incarnation: u64,
}

impl FleetDriver {
    pub(crate) fn new(
        cfg: FleetConfig,
        factory: Arc<dyn SessionFactory>,
        bus: Bus,
        token: CancellationToken,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        let scheduler = ConnectionScheduler::new(cfg.admission_limit());
        Self {
            cfg,
            factory,
            bus,
            token,
            signals,
            generation: FleetGeneration::idle(0),
            scheduler,
            readiness: ReadinessAggregator::default(),
            prefix: String::new(),
            next_incarnation: 0,
        }
    }

    /// Runs until shutdown, cancellation, or every controller handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut signals: mpsc::UnboundedReceiver<Signal>,
    ) {
        let token = self.token.clone();
        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                Some(sig) = signals.recv() => self.on_signal(sig),

                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.stop();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.on_command(cmd),
                    None => break,
                },
            }
        }
        self.stop();
        token.cancel();
        tracing::debug!("fleet driver exited");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start {
                count,
                prefix,
                endpoint,
                reply,
            } => {
                let _ = reply.send(self.start(count, prefix, endpoint));
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(());
            }
            Command::Kick { identity, reply } => {
                let _ = reply.send(self.kick(identity));
            }
            Command::Restore { identity, reply } => {
                let _ = reply.send(self.restore(identity));
            }
            Command::Send {
                identity,
                text,
                reply,
            } => {
                let _ = reply.send(self.send(identity, &text));
            }
            Command::Broadcast { text, reply } => {
                let _ = reply.send(self.broadcast(&text));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(
                    self.generation.snapshot(
                        self.scheduler.active(),
                        self.scheduler.queued(),
                        self.readiness.settled(),
                    ),
                );
            }
            Command::Shutdown { reply } => {
                self.stop();
                let _ = reply.send(());
            }
        }
    }

    fn on_signal(&mut self, sig: Signal) {
        match sig {
            Signal::Session {
                ticket,
                identity,
                event,
            } => match self.generation.locate(&ticket) {
                Some(pos) => self.apply(pos, Input::Session(event)),
                None => tracing::trace!(%identity, ?event, "stale session event dropped"),
            },
            Signal::Timer { ticket, kind } => {
                let Some(pos) = self.generation.locate(&ticket) else {
                    return;
                };
                let input = match kind {
                    TimerKind::AttemptTimeout => Input::AttemptTimedOut,
                    TimerKind::RetryDue => Input::RetryDue,
                };
                self.apply(pos, input);
            }
            Signal::Spawn { generation, index } => self.spawn_client(generation, index),
            Signal::Restore {
                generation,
                identity,
                incarnation,
            } => self.finish_restore(generation, identity, incarnation),
        }
    }

    // ---- fleet lifecycle ----

    fn start(&mut self, count: usize, prefix: String, endpoint: Endpoint) -> Result<(), ControlError> {
        if self.generation.is_active() {
            return Err(ControlError::AdmissionRejected);
        }
        if count == 0 || count > self.cfg.max_fleet_size {
            return Err(ControlError::InvalidFleetSize {
                count,
                max: self.cfg.max_fleet_size,
            });
        }
        self.discard();

        let id = self.generation.id + 1;
        self.generation = FleetGeneration::starting(id, count, endpoint.clone());
        self.readiness = ReadinessAggregator::new(count);
        self.prefix = prefix;
        self.bus.publish(
            Event::new(EventKind::FleetStarting)
                .with_total(count)
                .with_reason(endpoint.to_string()),
        );

        if self.cfg.spawn_stagger.is_zero() {
            for index in 0..count {
                self.spawn_client(id, index);
            }
        } else {
            for index in 0..count {
                let delay = self.cfg.spawn_stagger.saturating_mul(index as u32);
                self.defer(delay, Signal::Spawn { generation: id, index });
            }
        }
        Ok(())
    }

    /// Quits every client and discards the generation. Idempotent.
    fn stop(&mut self) {
        let was_active = self.generation.is_active();
        let quit = self.discard();
        self.generation = FleetGeneration::idle(self.generation.id + 1);
        self.readiness = ReadinessAggregator::default();
        if was_active || quit > 0 {
            self.bus
                .publish(Event::new(EventKind::FleetStopped).with_total(quit));
        }
    }

    /// Closes all sessions and empties the admission queue. Returns the roster size.
    fn discard(&mut self) -> usize {
        self.generation.close_all();
        self.scheduler.clear();
        self.generation.records.len()
    }

    fn spawn_client(&mut self, generation: u64, index: usize) {
        if generation != self.generation.id || !self.generation.starting {
            return;
        }
        let identity = Identity::derive(&self.prefix, index + 1);
        let incarnation = self.next_incarnation();
        self.generation.records.push(ClientStateMachine::queued(
            identity.clone(),
            incarnation,
            index == 0,
            self.cfg.retry,
        ));
        let created = self.generation.records.len();
        if created >= self.generation.expected {
            self.generation.starting = false;
        }
        self.bus.publish(
            Event::new(EventKind::ClientQueued)
                .with_identity(&identity)
                .with_counts(created, self.generation.expected),
        );
        self.scheduler.enqueue(AdmissionEntry {
            identity,
            incarnation,
        });
        self.pump();
    }

    /// Admits queued clients while slots are free.
    fn pump(&mut self) {
        while let Some(entry) = self.scheduler.try_admit_next() {
            let pos = self
                .generation
                .records
                .iter()
                .position(|r| r.incarnation() == entry.incarnation);
            let Some(pos) = pos else {
                self.scheduler.release();
                continue;
            };
            self.bus.publish(
                Event::new(EventKind::ClientAdmitted)
                    .with_identity(&entry.identity)
                    .with_active(self.scheduler.active()),
            );
            self.apply(pos, Input::Admitted);
        }
    }

    // ---- per-client operations ----

    fn kick(&mut self, identity: Identity) -> Result<(), ControlError> {
        let pos = self
            .generation
            .position(&identity)
            .ok_or(ControlError::NotFound { identity })?;
        self.apply(
            pos,
            Input::Quit {
                reason: "kick",
                settle: true,
            },
        );
        Ok(())
    }

    fn restore(&mut self, identity: Identity) -> Result<(), ControlError> {
        let Some(pos) = self.generation.position(&identity) else {
            return Err(ControlError::NotFound { identity });
        };
        let incarnation = self.generation.records[pos].incarnation();
        // The fresh record settles the identity if its first connection was pending.
        self.apply(
            pos,
            Input::Quit {
                reason: "restore",
                settle: false,
            },
        );
        self.defer(
            self.cfg.restore_settle,
            Signal::Restore {
                generation: self.generation.id,
                identity,
                incarnation,
            },
        );
        Ok(())
    }

    /// Replaces the quit record in place with a fresh one that connects directly.
    fn finish_restore(&mut self, generation: u64, identity: Identity, incarnation: u64) {
        if generation != self.generation.id {
            return;
        }
        let Some(pos) = self.generation.position(&identity) else {
            return;
        };
        if self.generation.records[pos].incarnation() != incarnation {
            // A later restore already replaced it.
            return;
        }
        let listener = self.generation.records[pos].is_listener();
        let fresh = ClientStateMachine::direct(
            identity.clone(),
            self.next_incarnation(),
            listener,
            self.cfg.retry,
        );
        let mut old = std::mem::replace(&mut self.generation.records[pos], fresh);
        old.close_session();

        self.bus
            .publish(Event::new(EventKind::ClientRestored).with_identity(&identity));
        self.apply(pos, Input::DirectStart);
    }

    fn send(&mut self, identity: Identity, text: &str) -> Result<(), ControlError> {
        let Some(pos) = self.generation.position(&identity) else {
            return Err(ControlError::NotFound { identity });
        };
        match self.generation.records[pos].send(text) {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::MessageSent)
                        .with_identity(&identity)
                        .with_text(text),
                );
                Ok(())
            }
            Err(e) => {
                tracing::debug!(%identity, error = %e, "send refused");
                Err(ControlError::Unavailable { identity })
            }
        }
    }

    fn broadcast(&mut self, text: &str) -> Vec<Identity> {
        let mut delivered = Vec::new();
        for rec in &mut self.generation.records {
            if rec.state() != ClientState::Online {
                continue;
            }
            match rec.send(text) {
                Ok(()) => delivered.push(rec.identity().clone()),
                Err(e) => tracing::debug!(identity = %rec.identity(), error = %e, "broadcast skipped"),
            }
        }
        for identity in &delivered {
            self.bus.publish(
                Event::new(EventKind::MessageSent)
                    .with_identity(identity)
                    .with_text(text),
            );
        }
        delivered
    }

    // ---- effect execution ----

    fn apply(&mut self, pos: usize, input: Input) {
        let running = self.generation.service_running;
        let effects = self.generation.records[pos].handle(input, running);

        let mut released = false;
        for fx in effects {
            match fx {
                Effect::Open => self.open(pos),
                Effect::Close => self.generation.records[pos].close_session(),
                Effect::ArmTimeout(d) => self.arm(pos, d, TimerKind::AttemptTimeout),
                Effect::ScheduleRetry(d) => self.arm(pos, d, TimerKind::RetryDue),
                Effect::ReleaseSlot => {
                    self.scheduler.release();
                    released = true;
                }
                Effect::Dequeue => {
                    let identity = self.generation.records[pos].identity().clone();
                    self.scheduler.remove(&identity);
                }
                Effect::Settled { online } => self.on_settled(pos, online),
                Effect::Publish(ev) => self.bus.publish(ev),
            }
        }
        if released {
            self.pump();
        }
    }

    fn open(&mut self, pos: usize) {
        let Some(endpoint) = self.generation.endpoint.clone() else {
            return;
        };
        let rec = &self.generation.records[pos];
        let identity = rec.identity().clone();
        let sink = SessionSink::new(
            self.signals.clone(),
            rec.ticket(self.generation.id),
            identity.clone(),
        );
        let request = OpenRequest {
            identity,
            endpoint,
            connect_timeout: self.cfg.retry.connect_timeout,
            listener: rec.is_listener(),
        };
        let session = self.factory.open(request, sink);
        self.generation.records[pos].attach(session);
    }

    fn arm(&self, pos: usize, delay: Duration, kind: TimerKind) {
        let ticket = self.generation.records[pos].ticket(self.generation.id);
        self.defer(delay, Signal::Timer { ticket, kind });
    }

    /// Delivers `sig` back to the driver after `delay`, unless the driver stops first.
    fn defer(&self, delay: Duration, sig: Signal) {
        let tx = self.signals.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    let _ = tx.send(sig);
                }
            }
        });
    }

    fn on_settled(&mut self, pos: usize, online: bool) {
        let identity = self.generation.records[pos].identity().clone();
        let Some(settlement) = self.readiness.settle(&identity, online) else {
            return;
        };
        self.generation.all_ready = true;
        self.generation.maintenance_mode = false;
        self.generation.starting = false;
        if matches!(settlement, Settlement::TotalFailure { .. }) {
            self.generation.service_running = false;
        }
        self.bus.publish(
            Event::new(EventKind::FleetSettled)
                .with_counts(settlement.online(), settlement.total())
                .with_reason(settlement.as_label()),
        );
    }

    fn next_incarnation(&mut self) -> u64 {
        self.next_incarnation += 1;
        self.next_incarnation
    }
}
