//! In-memory relay for simulation.
//!
//! Speaks the relay side of the protocol: it decodes client commands and
//! queues the frames a real relay would broadcast. Nothing is delivered
//! until the test moves frames out with [`SimRelay::take_outbox`], so
//! delivery order and timing stay under the test's control.
//!
//! Connections are keyed by slot (one per simulated client). A slot has at
//! most one live transport; reconnecting replaces it.

use std::collections::{BTreeMap, VecDeque};

use parley_proto::{
    EncodeError, InboundEvent, OutboundEvent, ParseError, Participant, PresenceKind,
};
use serde_json::json;
use thiserror::Error;

/// How roster snapshots are framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterShape {
    /// `[{"id":..,"name":..}, ..]`
    #[default]
    BareArray,
    /// `{"users":[..]}`
    UsersObject,
}

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Frame arrived on a slot with no transport.
    #[error("slot {slot} has no open transport")]
    NotConnected {
        /// Sending slot
        slot: usize,
    },

    /// Frame did not decode as a client command.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Frame could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Default)]
struct Link {
    user: Option<Participant>,
    outbox: VecDeque<String>,
}

/// Simulated relay.
#[derive(Debug)]
pub struct SimRelay {
    links: BTreeMap<usize, Link>,
    reachable: bool,
    roster_shape: RosterShape,
    received: Vec<(usize, String)>,
}

impl Default for SimRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRelay {
    /// Create a reachable relay with no connections.
    pub fn new() -> Self {
        Self {
            links: BTreeMap::new(),
            reachable: true,
            roster_shape: RosterShape::default(),
            received: Vec::new(),
        }
    }

    /// Use `shape` for every roster snapshot.
    #[must_use]
    pub fn with_roster_shape(mut self, shape: RosterShape) -> Self {
        self.roster_shape = shape;
        self
    }

    /// Whether new transports can be opened.
    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    /// Make the relay (un)reachable for new transports.
    ///
    /// Existing transports are unaffected; drop them with
    /// [`SimRelay::disconnect`].
    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    /// Accept a transport for `slot`, replacing any previous one.
    ///
    /// Returns `false` if the relay is unreachable.
    pub fn connect(&mut self, slot: usize) -> bool {
        if !self.reachable {
            return false;
        }
        self.disconnect(slot);
        self.links.insert(slot, Link::default());
        tracing::trace!(slot, "relay accepted transport");
        true
    }

    /// Tear down the transport for `slot`.
    ///
    /// If a user was announced on it, everyone else is told they left.
    pub fn disconnect(&mut self, slot: usize) {
        if let Some(link) = self.links.remove(&slot)
            && link.user.is_some()
        {
            self.broadcast_presence(PresenceKind::Left);
        }
    }

    /// Whether `slot` has a live transport.
    pub fn is_connected(&self, slot: usize) -> bool {
        self.links.contains_key(&slot)
    }

    /// Handle a frame sent by the client on `slot`.
    pub fn receive(&mut self, slot: usize, raw: &str) -> Result<(), RelayError> {
        if !self.links.contains_key(&slot) {
            return Err(RelayError::NotConnected { slot });
        }
        self.received.push((slot, raw.to_owned()));

        match OutboundEvent::decode(raw)? {
            OutboundEvent::Join(identity) => {
                self.set_user(slot, Some(Participant::from(&identity)));
                self.broadcast_presence(PresenceKind::Joined);
            },
            OutboundEvent::RequestRoster => {
                let frame = self.roster_frame()?;
                self.push(slot, frame);
            },
            OutboundEvent::SendMessage(message) => {
                let frame = InboundEvent::MessageReceived(message).encode()?;
                for link in self.links.values_mut() {
                    link.outbox.push_back(frame.clone());
                }
            },
            OutboundEvent::Leave(_) => {
                self.set_user(slot, None);
                self.broadcast_presence(PresenceKind::Left);
            },
        }

        Ok(())
    }

    /// Drain the frames queued for `slot`.
    pub fn take_outbox(&mut self, slot: usize) -> Vec<String> {
        self.links
            .get_mut(&slot)
            .map(|link| link.outbox.drain(..).collect())
            .unwrap_or_default()
    }

    /// Whether any slot has frames waiting.
    pub fn has_pending(&self) -> bool {
        self.links.values().any(|link| !link.outbox.is_empty())
    }

    /// Announced participants, in slot order.
    pub fn roster(&self) -> Vec<Participant> {
        self.links.values().filter_map(|link| link.user.clone()).collect()
    }

    /// Every frame received, with its slot.
    pub fn received(&self) -> &[(usize, String)] {
        &self.received
    }

    /// Queue a raw frame for `slot`, bypassing the protocol.
    pub fn push(&mut self, slot: usize, raw: String) {
        if let Some(link) = self.links.get_mut(&slot) {
            link.outbox.push_back(raw);
        }
    }

    fn set_user(&mut self, slot: usize, user: Option<Participant>) {
        if let Some(link) = self.links.get_mut(&slot) {
            link.user = user;
        }
    }

    fn broadcast_presence(&mut self, kind: PresenceKind) {
        let frame = match kind {
            PresenceKind::Joined => json!({ "type": "user-joined" }),
            PresenceKind::Left => json!({ "type": "user-left" }),
        }
        .to_string();

        for link in self.links.values_mut() {
            link.outbox.push_back(frame.clone());
        }
    }

    fn roster_frame(&self) -> Result<String, RelayError> {
        let participants = self.roster();
        match self.roster_shape {
            RosterShape::BareArray => Ok(InboundEvent::RosterSnapshot { participants }.encode()?),
            RosterShape::UsersObject => Ok(json!({ "users": participants }).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::{ChatMessage, CorrelationId, Identity, ParticipantId};

    use super::*;

    fn identity(id: &str, name: &str) -> Identity {
        Identity::new(ParticipantId::new(id), name)
    }

    fn decoded(frames: &[String]) -> Vec<InboundEvent> {
        frames.iter().map(|raw| InboundEvent::decode(raw).unwrap()).collect()
    }

    #[test]
    fn join_broadcasts_and_roster_answers_sender_only() {
        let mut relay = SimRelay::new();
        relay.connect(0);
        relay.connect(1);

        relay.receive(0, &OutboundEvent::Join(identity("a", "alice")).encode().unwrap()).unwrap();
        relay.receive(0, &OutboundEvent::RequestRoster.encode().unwrap()).unwrap();

        let to_alice = decoded(&relay.take_outbox(0));
        let to_bob = decoded(&relay.take_outbox(1));

        assert_eq!(to_alice.len(), 2);
        assert!(matches!(
            &to_alice[1],
            InboundEvent::RosterSnapshot { participants } if participants.len() == 1
        ));
        assert_eq!(to_bob, vec![InboundEvent::PresenceChanged { kind: PresenceKind::Joined }]);
    }

    #[test]
    fn messages_echo_to_sender() {
        let mut relay = SimRelay::new();
        relay.connect(0);
        let alice = identity("a", "alice");
        let message = ChatMessage::compose("hi", &alice, CorrelationId::new("c1"));

        relay.receive(0, &OutboundEvent::SendMessage(message.clone()).encode().unwrap()).unwrap();

        assert_eq!(decoded(&relay.take_outbox(0)), vec![InboundEvent::MessageReceived(message)]);
    }

    #[test]
    fn users_object_shape() {
        let mut relay = SimRelay::new().with_roster_shape(RosterShape::UsersObject);
        relay.connect(0);
        relay.receive(0, &OutboundEvent::Join(identity("a", "alice")).encode().unwrap()).unwrap();
        relay.take_outbox(0);

        relay.receive(0, &OutboundEvent::RequestRoster.encode().unwrap()).unwrap();
        let frames = relay.take_outbox(0);

        assert!(frames[0].starts_with(r#"{"users":"#));
        assert!(matches!(
            InboundEvent::decode(&frames[0]).unwrap(),
            InboundEvent::RosterSnapshot { participants } if participants[0].name == "alice"
        ));
    }

    #[test]
    fn disconnect_of_announced_user_notifies_others() {
        let mut relay = SimRelay::new();
        relay.connect(0);
        relay.connect(1);
        relay.receive(0, &OutboundEvent::Join(identity("a", "alice")).encode().unwrap()).unwrap();
        relay.take_outbox(1);

        relay.disconnect(0);

        assert!(relay.roster().is_empty());
        assert_eq!(
            decoded(&relay.take_outbox(1)),
            vec![InboundEvent::PresenceChanged { kind: PresenceKind::Left }]
        );
    }

    #[test]
    fn unreachable_relay_refuses_and_rejects_frames() {
        let mut relay = SimRelay::new();
        relay.set_reachable(false);

        assert!(!relay.connect(0));
        assert!(matches!(relay.receive(0, "{}"), Err(RelayError::NotConnected { slot: 0 })));
    }
}
