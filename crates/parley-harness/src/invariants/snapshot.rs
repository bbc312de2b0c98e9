//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture what each simulated client did and shows at a point in
//! time. Invariants operate on snapshots rather than live sessions so every
//! check sees one consistent view.

use std::collections::BTreeMap;

use parley_core::ConnectionState;
use parley_proto::{CorrelationId, Identity, Participant};

/// Snapshot of the entire simulated system.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Frames one client wrote on one transport, by wire `type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// Whether the client had an identity when this transport opened.
    pub joined_at_open: bool,
    /// Wire types in transmit order.
    pub kinds: Vec<&'static str>,
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Client index in the world.
    pub id: usize,
    /// Identity after a completed join.
    pub identity: Option<Identity>,
    /// Connection state.
    pub state: ConnectionState,
    /// Roster as the session reports it.
    pub roster: Vec<Participant>,
    /// Last roster snapshot delivered to the session. `None` if none
    /// arrived since the last leave.
    pub last_snapshot: Option<Vec<Participant>>,
    /// How often each correlation id was rendered as the client's own.
    pub own_renders: BTreeMap<CorrelationId, usize>,
    /// One transcript per transport, oldest first.
    pub transcripts: Vec<Transcript>,
    /// Frames the relay refused.
    pub rejected_frames: usize,
}

impl ClientSnapshot {
    /// A disconnected client that has done nothing.
    pub fn new(id: usize) -> Self {
        Self {
            id,
            identity: None,
            state: ConnectionState::Disconnected,
            roster: Vec::new(),
            last_snapshot: None,
            own_renders: BTreeMap::new(),
            transcripts: Vec::new(),
            rejected_frames: 0,
        }
    }
}
