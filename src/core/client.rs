//! # ClientStateMachine: connection/retry state of one client.
//!
//! Each client of a generation is one [`ClientStateMachine`] value. Inputs
//! (admission, session events, timer expirations, manual quit) are fed to
//! [`ClientStateMachine::handle`], which updates the state and returns the
//! [`Effect`]s the driver must carry out. The machine itself never touches
//! sessions, timers or the scheduler, so every transition is testable without
//! a runtime.
//!
//! ## States
//! ```text
//!            admitted            ready
//!  Queued ───────────► Connecting ─────► Online ◄──────────┐
//!                        │  ▲              │ drop          │ ready
//!          fault/timeout │  │ retry due    ▼               │
//!                        └──┘          Reconnecting ───────┘
//!                        │                 (unbounded, carried backoff)
//!     attempts exhausted ▼
//!                      Failed
//!
//!  any state ──quit──► Idle
//! ```
//!
//! ## Rules
//! - First-connection failures are bounded by [`RetryPolicy::max_attempts`]; the
//!   retry delay is `min(first × factor^(n-1), max)`.
//! - Drops of an online client reconnect forever; the delay starts at `first`,
//!   grows by `factor` after each scheduled reconnect and resets on `Ready`.
//! - Abandoning an attempt (failure, drop, kick) bumps `epoch`, so callbacks
//!   scheduled for the old attempt no longer match the record's ticket.
//! - A slot is released only by a record that holds one, exactly once.

use std::fmt;
use std::time::Duration;

use crate::error::SessionError;
use crate::events::{Event, EventKind};
use crate::policies::RetryPolicy;
use crate::session::{Session, SessionEvent};

use super::types::{Identity, Ticket};

/// Observable state of a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientState {
    /// Manually quit; no automatic reconnects.
    Idle,
    /// Waiting in the admission queue for its first connection.
    Queued,
    /// Attempting (or waiting to retry) its first connection.
    Connecting,
    /// Session ready.
    Online,
    /// Lost an established session; reconnecting with backoff.
    Reconnecting,
    /// First-connection retries exhausted.
    Failed,
}

impl ClientState {
    /// Short lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientState::Idle => "idle",
            ClientState::Queued => "queued",
            ClientState::Connecting => "connecting",
            ClientState::Online => "online",
            ClientState::Reconnecting => "reconnecting",
            ClientState::Failed => "failed",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs the driver feeds into a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    /// The scheduler granted an admission slot.
    Admitted,
    /// A restored client starts connecting without admission.
    DirectStart,
    /// The session reported an event.
    Session(SessionEvent),
    /// The per-attempt timeout expired.
    AttemptTimedOut,
    /// A scheduled retry/reconnect is due.
    RetryDue,
    /// Manual quit (`kick`, or the first half of `restore`).
    Quit {
        /// Trigger reported in the state change.
        reason: &'static str,
        /// A pending first connection counts as failed. Unset when a fresh
        /// record takes over the identity and settles it instead.
        settle: bool,
    },
}

/// Side effects requested by a transition, executed by the driver in order.
#[derive(Debug, Clone)]
pub(crate) enum Effect {
    /// Open a new session for the record's current ticket.
    Open,
    /// Close and drop the current session handle.
    Close,
    /// Arm the per-attempt timeout.
    ArmTimeout(Duration),
    /// Fire `Input::RetryDue` after the delay.
    ScheduleRetry(Duration),
    /// Give the admission slot back to the scheduler.
    ReleaseSlot,
    /// Remove the record's entry from the admission queue.
    Dequeue,
    /// First-connection outcome is final.
    Settled {
        /// Whether the client reached `Online`.
        online: bool,
    },
    /// Publish an event on the bus.
    Publish(Event),
}

/// Connection state, retry counters and session handle of one client.
pub struct ClientStateMachine {
    identity: Identity,
    state: ClientState,
    first_pending: bool,
    manual_disconnect: bool,
    retry_attempt: u32,
    current_retry_delay: Duration,
    holds_slot: bool,
    listener: bool,
    incarnation: u64,
    epoch: u64,
    policy: RetryPolicy,
    session: Option<Box<dyn Session>>,
}

impl fmt::Debug for ClientStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStateMachine")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("first_pending", &self.first_pending)
            .field("retry_attempt", &self.retry_attempt)
            .field("incarnation", &self.incarnation)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl ClientStateMachine {
    /// Creates a record that waits for admission (fleet start).
    pub(crate) fn queued(identity: Identity, incarnation: u64, listener: bool, policy: RetryPolicy) -> Self {
        Self::with_state(identity, incarnation, listener, policy, ClientState::Queued)
    }

    /// Creates a record that connects directly (restore).
    pub(crate) fn direct(identity: Identity, incarnation: u64, listener: bool, policy: RetryPolicy) -> Self {
        Self::with_state(identity, incarnation, listener, policy, ClientState::Connecting)
    }

    fn with_state(
        identity: Identity,
        incarnation: u64,
        listener: bool,
        policy: RetryPolicy,
        state: ClientState,
    ) -> Self {
        Self {
            identity,
            state,
            first_pending: true,
            manual_disconnect: false,
            retry_attempt: 0,
            current_retry_delay: policy.backoff.first,
            holds_slot: false,
            listener,
            incarnation,
            epoch: 0,
            policy,
            session: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_first_pending(&self) -> bool {
        self.first_pending
    }

    pub fn retry_attempt(&self) -> u32 {
        self.retry_attempt
    }

    pub fn is_listener(&self) -> bool {
        self.listener
    }

    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Ticket identifying the record's current attempt.
    pub fn ticket(&self, generation: u64) -> Ticket {
        Ticket {
            generation,
            incarnation: self.incarnation,
            epoch: self.epoch,
        }
    }

    /// Stores the session opened for the current attempt.
    pub(crate) fn attach(&mut self, session: Box<dyn Session>) {
        self.close_session();
        self.session = Some(session);
    }

    /// Closes and drops the current session, if any.
    pub(crate) fn close_session(&mut self) {
        if let Some(mut s) = self.session.take() {
            s.close();
        }
    }

    /// Sends a message through an online session.
    pub(crate) fn send(&mut self, text: &str) -> Result<(), SessionError> {
        if self.state != ClientState::Online {
            return Err(SessionError::NotReady);
        }
        match self.session.as_mut() {
            Some(s) => s.send(text),
            None => Err(SessionError::Closed),
        }
    }

    /// Applies one input and returns the effects to execute.
    ///
    /// `service_running` is the fleet flag; drops of an online client are only
    /// reconnected while it is set.
    pub(crate) fn handle(&mut self, input: Input, service_running: bool) -> Vec<Effect> {
        match input {
            Input::Admitted => self.on_admitted(),
            Input::DirectStart => match self.state {
                ClientState::Connecting if self.session.is_none() => self.begin_attempt(),
                _ => Vec::new(),
            },
            Input::RetryDue => match self.state {
                _ if self.manual_disconnect => Vec::new(),
                ClientState::Connecting | ClientState::Reconnecting if !service_running => {
                    self.epoch += 1;
                    vec![self.transition(ClientState::Idle, "service stopped")]
                }
                ClientState::Connecting | ClientState::Reconnecting => self.begin_attempt(),
                _ => Vec::new(),
            },
            Input::Session(SessionEvent::Ready) => self.on_ready(),
            Input::Session(SessionEvent::Fault { reason }) => {
                self.on_failure(SessionError::Fault { reason }, service_running)
            }
            Input::Session(SessionEvent::Disconnected { reason }) => {
                self.on_failure(SessionError::Disconnected { reason }, service_running)
            }
            Input::Session(SessionEvent::Connecting) => Vec::new(),
            Input::Session(SessionEvent::Chat { from, text }) => self.on_chat(from, text),
            Input::AttemptTimedOut => self.on_timeout(service_running),
            Input::Quit { reason, settle } => self.on_quit(reason, settle),
        }
    }

    fn on_admitted(&mut self) -> Vec<Effect> {
        if self.state != ClientState::Queued || self.manual_disconnect {
            // Nothing to use the slot for; hand it straight back.
            return vec![Effect::ReleaseSlot];
        }
        self.holds_slot = true;
        let mut fx = vec![self.transition(ClientState::Connecting, "admitted")];
        fx.extend(self.begin_attempt());
        fx
    }

    fn begin_attempt(&mut self) -> Vec<Effect> {
        let mut fx = vec![Effect::Open];
        if self.first_pending {
            if let Some(t) = self.policy.connect_timeout {
                fx.push(Effect::ArmTimeout(t));
            }
        }
        fx
    }

    fn on_ready(&mut self) -> Vec<Effect> {
        if matches!(self.state, ClientState::Idle | ClientState::Failed | ClientState::Queued) {
            return Vec::new();
        }
        self.retry_attempt = 0;
        self.current_retry_delay = self.policy.backoff.first;
        self.manual_disconnect = false;

        if !self.first_pending {
            return vec![self.transition(ClientState::Online, "reconnected")];
        }
        self.first_pending = false;
        let mut fx = vec![self.transition(ClientState::Online, "ready")];
        if std::mem::take(&mut self.holds_slot) {
            fx.push(Effect::ReleaseSlot);
        }
        fx.push(Effect::Settled { online: true });
        fx
    }

    fn on_timeout(&mut self, service_running: bool) -> Vec<Effect> {
        let Some(timeout) = self.policy.connect_timeout else {
            return Vec::new();
        };
        if !self.first_pending || self.state != ClientState::Connecting {
            return Vec::new();
        }
        let mut fx = vec![Effect::Publish(
            Event::new(EventKind::TimeoutHit)
                .with_identity(&self.identity)
                .with_attempt(self.retry_attempt + 1)
                .with_timeout(timeout),
        )];
        fx.extend(self.on_failure(SessionError::Timeout { timeout }, service_running));
        fx
    }

    fn on_failure(&mut self, err: SessionError, service_running: bool) -> Vec<Effect> {
        if self.manual_disconnect || !err.counts_as_attempt() {
            return Vec::new();
        }
        match self.state {
            ClientState::Connecting if self.first_pending => self.on_first_failure(err),
            ClientState::Online | ClientState::Reconnecting => {
                self.on_connection_lost(err, service_running)
            }
            _ => Vec::new(),
        }
    }

    fn on_first_failure(&mut self, err: SessionError) -> Vec<Effect> {
        self.epoch += 1;
        self.retry_attempt += 1;
        let mut fx = vec![Effect::Close];

        if self.policy.is_exhausted(self.retry_attempt) {
            self.first_pending = false;
            let exhausted = SessionError::RetryExhausted {
                attempts: self.retry_attempt,
            };
            fx.push(Effect::Publish(
                Event::new(EventKind::RetryExhausted)
                    .with_identity(&self.identity)
                    .with_attempt(self.retry_attempt)
                    .with_reason(err.as_message()),
            ));
            fx.push(self.transition(ClientState::Failed, &exhausted.to_string()));
            if std::mem::take(&mut self.holds_slot) {
                fx.push(Effect::ReleaseSlot);
            }
            fx.push(Effect::Settled { online: false });
            return fx;
        }

        let delay = self
            .policy
            .backoff
            .jittered(self.policy.retry_delay(self.retry_attempt));
        fx.push(Effect::Publish(
            Event::new(EventKind::BackoffScheduled)
                .with_identity(&self.identity)
                .with_attempt(self.retry_attempt)
                .with_delay(delay)
                .with_reason(err.as_message()),
        ));
        fx.push(Effect::ScheduleRetry(delay));
        fx
    }

    fn on_connection_lost(&mut self, err: SessionError, service_running: bool) -> Vec<Effect> {
        self.epoch += 1;
        let mut fx = vec![Effect::Close];
        if !service_running {
            fx.push(self.transition(ClientState::Idle, &err.as_message()));
            return fx;
        }

        let delay = self.policy.backoff.jittered(self.current_retry_delay);
        self.current_retry_delay = self.policy.backoff.grow(self.current_retry_delay);
        if self.state != ClientState::Reconnecting {
            fx.push(self.transition(ClientState::Reconnecting, &err.as_message()));
        }
        fx.push(Effect::Publish(
            Event::new(EventKind::BackoffScheduled)
                .with_identity(&self.identity)
                .with_attempt(0)
                .with_delay(delay)
                .with_reason(err.as_message()),
        ));
        fx.push(Effect::ScheduleRetry(delay));
        fx
    }

    fn on_chat(&mut self, from: String, text: String) -> Vec<Effect> {
        if !self.listener || from == self.identity.as_str() {
            return Vec::new();
        }
        vec![Effect::Publish(
            Event::new(EventKind::ChatReceived)
                .with_identity(&self.identity)
                .with_reason(from)
                .with_text(text),
        )]
    }

    fn on_quit(&mut self, reason: &str, settle: bool) -> Vec<Effect> {
        self.manual_disconnect = true;
        self.epoch += 1;
        let mut fx = vec![Effect::Close];

        if self.first_pending {
            self.first_pending = false;
            if self.state == ClientState::Queued {
                fx.push(Effect::Dequeue);
            }
            if std::mem::take(&mut self.holds_slot) {
                fx.push(Effect::ReleaseSlot);
            }
            if settle {
                fx.push(Effect::Settled { online: false });
            }
        }
        if self.state != ClientState::Idle {
            fx.push(self.transition(ClientState::Idle, reason));
        }
        fx
    }

    fn transition(&mut self, to: ClientState, reason: &str) -> Effect {
        let from = std::mem::replace(&mut self.state, to);
        Effect::Publish(
            Event::new(EventKind::StateChanged)
                .with_identity(&self.identity)
                .with_transition(from, to)
                .with_reason(reason),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, JitterPolicy};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            connect_timeout: Some(Duration::from_secs(20)),
            backoff: BackoffPolicy {
                first: Duration::from_millis(2000),
                max: Duration::from_millis(10_000),
                factor: 1.5,
                jitter: JitterPolicy::None,
            },
        }
    }

    fn fault() -> Input {
        Input::Session(SessionEvent::Fault { reason: "refused".into() })
    }

    fn drop_conn() -> Input {
        Input::Session(SessionEvent::Disconnected { reason: "reset".into() })
    }

    fn retries(fx: &[Effect]) -> Vec<Duration> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::ScheduleRetry(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    fn has(fx: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
        fx.iter().any(pred)
    }

    fn admitted(max_attempts: u32) -> ClientStateMachine {
        let mut c = ClientStateMachine::queued("bot_001".into(), 1, false, policy(max_attempts));
        let fx = c.handle(Input::Admitted, true);
        assert!(has(&fx, |e| matches!(e, Effect::Open)));
        assert!(has(&fx, |e| matches!(e, Effect::ArmTimeout(_))));
        c
    }

    #[test]
    fn first_ready_releases_slot_and_settles() {
        let mut c = admitted(5);
        assert_eq!(c.state(), ClientState::Connecting);

        let fx = c.handle(Input::Session(SessionEvent::Ready), true);
        assert_eq!(c.state(), ClientState::Online);
        assert!(!c.is_first_pending());
        assert!(has(&fx, |e| matches!(e, Effect::ReleaseSlot)));
        assert!(has(&fx, |e| matches!(e, Effect::Settled { online: true })));
    }

    #[test]
    fn exhausting_retries_yields_expected_delays_then_failed() {
        let mut c = admitted(6);
        let mut delays = Vec::new();
        for _ in 0..5 {
            let fx = c.handle(fault(), true);
            delays.extend(retries(&fx));
            assert_eq!(c.state(), ClientState::Connecting);
            c.handle(Input::RetryDue, true);
        }
        let ms: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![2000, 3000, 4500, 6750, 10_000]);

        let fx = c.handle(fault(), true);
        assert_eq!(c.state(), ClientState::Failed);
        assert!(retries(&fx).is_empty());
        assert!(has(&fx, |e| matches!(e, Effect::ReleaseSlot)));
        assert!(has(&fx, |e| matches!(e, Effect::Settled { online: false })));
        assert_eq!(c.retry_attempt(), 6);
    }

    #[test]
    fn retry_count_never_exceeds_budget() {
        let mut c = admitted(5);
        let mut scheduled = 0;
        for _ in 0..20 {
            scheduled += retries(&c.handle(fault(), true)).len();
            c.handle(Input::RetryDue, true);
        }
        assert_eq!(scheduled, 4);
        assert_eq!(c.retry_attempt(), 5);
        assert_eq!(c.state(), ClientState::Failed);
    }

    #[test]
    fn failure_bumps_epoch_so_old_ticket_is_stale() {
        let mut c = admitted(5);
        let before = c.ticket(1);
        c.handle(fault(), true);
        assert_ne!(before, c.ticket(1));
    }

    #[test]
    fn reconnect_backoff_grows_and_resets_on_ready() {
        let mut c = admitted(5);
        c.handle(Input::Session(SessionEvent::Ready), true);

        let mut delays = Vec::new();
        for _ in 0..6 {
            delays.extend(retries(&c.handle(drop_conn(), true)));
            assert_eq!(c.state(), ClientState::Reconnecting);
            c.handle(Input::RetryDue, true);
            // Reconnect attempt fails again before ever becoming ready.
        }
        let ms: Vec<u128> = delays.iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![2000, 3000, 4500, 6750, 10_000, 10_000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));

        let fx = c.handle(Input::Session(SessionEvent::Ready), true);
        assert_eq!(c.state(), ClientState::Online);
        assert!(!has(&fx, |e| matches!(e, Effect::ReleaseSlot | Effect::Settled { .. })));
        let ms: Vec<u128> = retries(&c.handle(drop_conn(), true)).iter().map(Duration::as_millis).collect();
        assert_eq!(ms, vec![2000]);
    }

    #[test]
    fn drop_without_service_goes_idle() {
        let mut c = admitted(5);
        c.handle(Input::Session(SessionEvent::Ready), true);
        let fx = c.handle(drop_conn(), false);
        assert_eq!(c.state(), ClientState::Idle);
        assert!(retries(&fx).is_empty());
    }

    #[test]
    fn kick_suppresses_reconnects() {
        let mut c = admitted(5);
        c.handle(Input::Session(SessionEvent::Ready), true);

        c.handle(Input::Quit { reason: "kick", settle: true }, true);
        assert_eq!(c.state(), ClientState::Idle);
        assert!(c.handle(drop_conn(), true).is_empty());
        assert!(c.handle(Input::RetryDue, true).is_empty());
    }

    #[test]
    fn kick_while_queued_dequeues_and_settles() {
        let mut c = ClientStateMachine::queued("bot_002".into(), 2, false, policy(5));
        let fx = c.handle(Input::Quit { reason: "kick", settle: true }, true);
        assert!(has(&fx, |e| matches!(e, Effect::Dequeue)));
        assert!(has(&fx, |e| matches!(e, Effect::Settled { online: false })));
        assert!(!has(&fx, |e| matches!(e, Effect::ReleaseSlot)));
    }

    #[test]
    fn quit_for_replacement_frees_the_slot_without_settling() {
        let mut c = admitted(5);
        c.handle(fault(), true);
        let fx = c.handle(Input::Quit { reason: "restore", settle: false }, true);
        assert_eq!(c.state(), ClientState::Idle);
        assert!(has(&fx, |e| matches!(e, Effect::ReleaseSlot)));
        assert!(!has(&fx, |e| matches!(e, Effect::Settled { .. })));
    }

    #[test]
    fn retry_due_after_service_stopped_goes_idle() {
        let mut c = admitted(5);
        c.handle(fault(), true);
        let before = c.ticket(1);
        let fx = c.handle(Input::RetryDue, false);
        assert_eq!(c.state(), ClientState::Idle);
        assert!(!has(&fx, |e| matches!(e, Effect::Open)));
        assert_ne!(before, c.ticket(1));

        let mut online = admitted(5);
        online.handle(Input::Session(SessionEvent::Ready), true);
        online.handle(drop_conn(), true);
        assert!(!has(&online.handle(Input::RetryDue, false), |e| matches!(e, Effect::Open)));
        assert_eq!(online.state(), ClientState::Idle);
    }

    #[test]
    fn timeout_counts_only_while_first_pending() {
        let mut c = admitted(5);
        let fx = c.handle(Input::AttemptTimedOut, true);
        assert_eq!(retries(&fx), vec![Duration::from_millis(2000)]);

        c.handle(Input::RetryDue, true);
        c.handle(Input::Session(SessionEvent::Ready), true);
        assert!(c.handle(Input::AttemptTimedOut, true).is_empty());
    }

    #[test]
    fn direct_start_never_releases_a_slot() {
        let mut c = ClientStateMachine::direct("bot_003".into(), 3, true, policy(1));
        assert!(has(&c.handle(Input::DirectStart, true), |e| matches!(e, Effect::Open)));
        let fx = c.handle(fault(), true);
        assert_eq!(c.state(), ClientState::Failed);
        assert!(!has(&fx, |e| matches!(e, Effect::ReleaseSlot)));
    }

    #[test]
    fn only_listener_forwards_chat() {
        let chat = || Input::Session(SessionEvent::Chat { from: "steve".into(), text: "hi".into() });
        let mut quiet = ClientStateMachine::queued("bot_002".into(), 2, false, policy(5));
        assert!(quiet.handle(chat(), true).is_empty());

        let mut listener = ClientStateMachine::queued("bot_001".into(), 1, true, policy(5));
        assert!(has(&listener.handle(chat(), true), |e| matches!(e, Effect::Publish(_))));
    }
}
