//! # FleetGeneration: one lifetime of a fleet.
//!
//! A generation is the roster of client records plus the fleet-level flags.
//! Starting or stopping a fleet replaces the whole value in one assignment;
//! generations never coexist, and anything scheduled for an old generation is
//! recognised by its [`Ticket`] and dropped.

use super::client::{ClientState, ClientStateMachine};
use super::types::{Endpoint, Identity, Ticket};

/// Roster and flags of the current fleet.
#[derive(Debug, Default)]
pub struct FleetGeneration {
    /// Monotonic id; 0 means "no fleet ever started".
    pub id: u64,
    /// Records in creation order (index 0 is the designated listener).
    pub records: Vec<ClientStateMachine>,
    /// Clients requested by `start_fleet`.
    pub expected: usize,
    /// Target server.
    pub endpoint: Option<Endpoint>,
    /// A service is running for this generation.
    pub service_running: bool,
    /// Commands other than stop are gated until every client settled.
    pub maintenance_mode: bool,
    /// Every client has settled.
    pub all_ready: bool,
    /// Records are still being created.
    pub starting: bool,
}

impl FleetGeneration {
    /// Creates an empty, inactive generation with the given id.
    pub fn idle(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Creates a starting generation.
    pub fn starting(id: u64, expected: usize, endpoint: Endpoint) -> Self {
        Self {
            id,
            records: Vec::with_capacity(expected),
            expected,
            endpoint: Some(endpoint),
            service_running: true,
            maintenance_mode: true,
            all_ready: false,
            starting: true,
        }
    }

    /// Whether a new fleet may not start now.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.starting || self.service_running
    }

    /// Position of a record in the roster.
    pub fn position(&self, identity: &Identity) -> Option<usize> {
        self.records.iter().position(|r| r.identity() == identity)
    }

    /// Roster position of the record a callback was scheduled for, if it is still current.
    pub fn locate(&self, ticket: &Ticket) -> Option<usize> {
        if ticket.generation != self.id {
            return None;
        }
        self.records
            .iter()
            .position(|r| r.incarnation() == ticket.incarnation)
            .filter(|&pos| self.records[pos].ticket(self.id) == *ticket)
    }

    /// Closes every session of the roster.
    pub fn close_all(&mut self) {
        for r in &mut self.records {
            r.close_session();
        }
    }

    /// Read-only view for the command layer.
    pub fn snapshot(&self, active: usize, queued: usize, settled: usize) -> FleetSnapshot {
        FleetSnapshot {
            generation: self.id,
            endpoint: self.endpoint.clone(),
            service_running: self.service_running,
            maintenance_mode: self.maintenance_mode,
            all_ready: self.all_ready,
            starting: self.starting,
            active_connections: active,
            queued,
            settled,
            clients: self
                .records
                .iter()
                .map(|r| ClientSnapshot {
                    identity: r.identity().clone(),
                    state: r.state(),
                    first_pending: r.is_first_pending(),
                    retry_attempt: r.retry_attempt(),
                    listener: r.is_listener(),
                })
                .collect(),
        }
    }
}

/// Point-in-time view of one client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientSnapshot {
    /// Client name.
    pub identity: Identity,
    /// Current state.
    pub state: ClientState,
    /// First connection not yet settled.
    pub first_pending: bool,
    /// Failed attempts since the last success.
    pub retry_attempt: u32,
    /// Designated chat listener.
    pub listener: bool,
}

/// Point-in-time view of the fleet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FleetSnapshot {
    /// Generation id.
    pub generation: u64,
    /// Target server, if a fleet was started.
    pub endpoint: Option<Endpoint>,
    /// Service running.
    pub service_running: bool,
    /// Maintenance mode (commands gated).
    pub maintenance_mode: bool,
    /// Every client settled.
    pub all_ready: bool,
    /// Records still being created.
    pub starting: bool,
    /// First connections in flight.
    pub active_connections: usize,
    /// Clients waiting for admission.
    pub queued: usize,
    /// Clients whose first connection has settled (online or failed).
    pub settled: usize,
    /// Per-client view, in roster order.
    pub clients: Vec<ClientSnapshot>,
}

impl FleetSnapshot {
    /// Looks a client up by name.
    pub fn client(&self, identity: &str) -> Option<&ClientSnapshot> {
        self.clients.iter().find(|c| c.identity.as_str() == identity)
    }

    /// Number of online clients.
    pub fn online(&self) -> usize {
        self.clients
            .iter()
            .filter(|c| c.state == ClientState::Online)
            .count()
    }

    /// Number of clients in the given state.
    pub fn count(&self, state: ClientState) -> usize {
        self.clients.iter().filter(|c| c.state == state).count()
    }
}
