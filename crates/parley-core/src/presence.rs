//! Presence tracking.
//!
//! The relay is the sole authority on who is present. Every snapshot replaces
//! the roster wholesale, in the relay's order; presence hints never patch it
//! locally.

use parley_proto::{Participant, ParticipantId};

/// Last roster snapshot received from the relay.
///
/// When the transport drops, the roster is kept but marked stale until the
/// next snapshot arrives.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    roster: Vec<Participant>,
    stale: bool,
    snapshots: u64,
}

impl PresenceTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with `participants`, as received.
    pub fn apply_snapshot(&mut self, participants: Vec<Participant>) {
        tracing::debug!(count = participants.len(), "roster snapshot");
        self.roster = participants;
        self.stale = false;
        self.snapshots += 1;
    }

    /// Current roster in relay order.
    pub fn current_roster(&self) -> &[Participant] {
        &self.roster
    }

    /// Whether `id` appears in the current roster.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.roster.iter().any(|p| &p.id == id)
    }

    /// Number of participants in the current roster.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Mark the roster as possibly out of date.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Whether the roster predates the current transport.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Snapshots applied so far.
    pub fn snapshot_count(&self) -> u64 {
        self.snapshots
    }

    /// Drop the roster entirely.
    pub fn clear(&mut self) {
        self.roster.clear();
        self.stale = false;
    }
}
