//! Scripted in-memory sessions for driver/controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{OpenRequest, Session, SessionEvent, SessionFactory, SessionSink};
use crate::core::Identity;
use crate::error::SessionError;

/// What one connection attempt does after the factory latency.
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    Ready,
    Fault(&'static str),
    /// Never reports anything (exercises the attempt timeout).
    Hang,
}

#[derive(Default)]
struct State {
    scripts: HashMap<Identity, VecDeque<Outcome>>,
    opened: Vec<Identity>,
    sent: Vec<(Identity, String)>,
    live: HashMap<Identity, SessionSink>,
}

#[derive(Clone)]
pub(crate) struct ScriptedFactory {
    state: Arc<Mutex<State>>,
    fallback: Outcome,
    latency: Duration,
}

impl ScriptedFactory {
    pub(crate) fn new(fallback: Outcome) -> Self {
        Self {
            state: Arc::default(),
            fallback,
            latency: Duration::from_millis(10),
        }
    }

    /// Queues outcomes for the next attempts of `identity`; later attempts use the fallback.
    pub(crate) fn script(self, identity: &str, outcomes: Vec<Outcome>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(Identity::from(identity), outcomes.into());
        self
    }

    pub(crate) fn opened(&self) -> Vec<Identity> {
        self.state.lock().unwrap().opened.clone()
    }

    pub(crate) fn opened_for(&self, identity: &str) -> usize {
        self.opened().iter().filter(|i| i.as_str() == identity).count()
    }

    pub(crate) fn sent(&self) -> Vec<(Identity, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Simulates the server dropping a ready session.
    pub(crate) fn drop_connection(&self, identity: &str, reason: &str) -> bool {
        let sink = self.state.lock().unwrap().live.remove(&Identity::from(identity));
        match sink {
            Some(sink) => sink.emit(SessionEvent::Disconnected {
                reason: reason.to_string(),
            }),
            None => false,
        }
    }

    /// Simulates a chat line arriving on a ready session.
    pub(crate) fn chat(&self, identity: &str, from: &str, text: &str) -> bool {
        let state = self.state.lock().unwrap();
        match state.live.get(&Identity::from(identity)) {
            Some(sink) => sink.emit(SessionEvent::Chat {
                from: from.to_string(),
                text: text.to_string(),
            }),
            None => false,
        }
    }
}

impl SessionFactory for ScriptedFactory {
    fn open(&self, request: OpenRequest, sink: SessionSink) -> Box<dyn Session> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.opened.push(request.identity.clone());
            state
                .scripts
                .get_mut(&request.identity)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| self.fallback.clone())
        };

        let state = Arc::clone(&self.state);
        let latency = self.latency;
        let identity = request.identity.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            match outcome {
                Outcome::Ready => {
                    sink.emit(SessionEvent::Connecting);
                    sink.emit(SessionEvent::Ready);
                    state.lock().unwrap().live.insert(identity, sink);
                }
                Outcome::Fault(reason) => {
                    sink.emit(SessionEvent::Fault {
                        reason: reason.to_string(),
                    });
                }
                Outcome::Hang => {}
            }
        });

        Box::new(MockSession {
            identity: request.identity,
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

struct MockSession {
    identity: Identity,
    state: Arc<Mutex<State>>,
    closed: bool,
}

impl Session for MockSession {
    fn send(&mut self, text: &str) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.state
            .lock()
            .unwrap()
            .sent
            .push((self.identity.clone(), text.to_string()));
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
