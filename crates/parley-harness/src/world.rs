//! Several sessions sharing one simulated relay.
//!
//! The world executes session actions itself instead of going through a
//! driver: opening a transport connects to the [`SimRelay`] at once (or fails
//! at once while the relay is unreachable), transmits are handed straight to
//! the relay, and closes are fed back as `TransportClosed`. Frames the relay
//! queues stay queued until [`World::settle`].

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use parley_client::{Session, SessionConfig, SessionEvent};
use parley_core::{ConnectionAction, env::Environment};
use parley_proto::{InboundEvent, OutboundEvent, Participant};

use crate::{
    invariants::{ClientSnapshot, SystemSnapshot, Transcript},
    operation::Operation,
    recorder::RecordingObserver,
    sim_env::SimEnv,
    sim_relay::SimRelay,
};

/// Settle rounds after which delivery is assumed to be looping.
const MAX_SETTLE_ROUNDS: usize = 64;

/// Index of a client in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(pub usize);

/// A session plus everything the harness observed about it.
pub struct SimClient {
    session: Session<SimEnv>,
    observer: RecordingObserver,
    last_snapshot: Option<Vec<Participant>>,
    transcripts: Vec<Transcript>,
    rejected: usize,
}

impl SimClient {
    fn new(env: SimEnv, config: SessionConfig) -> Self {
        Self {
            session: Session::new(env, config),
            observer: RecordingObserver::new(),
            last_snapshot: None,
            transcripts: Vec::new(),
            rejected: 0,
        }
    }

    /// The session under test.
    pub fn session(&self) -> &Session<SimEnv> {
        &self.session
    }

    /// Notifications delivered so far.
    pub fn observer(&self) -> &RecordingObserver {
        &self.observer
    }

    /// Mutable access to the notifications, e.g. to drain them.
    pub fn observer_mut(&mut self) -> &mut RecordingObserver {
        &mut self.observer
    }

    /// Last roster snapshot the session received since its last leave.
    pub fn last_snapshot(&self) -> Option<&[Participant]> {
        self.last_snapshot.as_deref()
    }

    /// Frames written, one transcript per transport.
    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// Wire types written on the current (latest) transport.
    pub fn current_transcript(&self) -> &[&'static str] {
        self.transcripts.last().map(|t| t.kinds.as_slice()).unwrap_or_default()
    }

    /// Frames the relay refused.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    fn snapshot(&self, id: usize) -> ClientSnapshot {
        let mut own_renders = BTreeMap::new();
        for (message, is_mine) in self.observer.rendered() {
            if let (true, Some(correlation_id)) = (is_mine, &message.correlation_id) {
                *own_renders.entry(correlation_id.clone()).or_insert(0) += 1;
            }
        }

        ClientSnapshot {
            id,
            identity: self.session.identity().cloned(),
            state: self.session.connection_state(),
            roster: self.session.roster().to_vec(),
            last_snapshot: self.last_snapshot.clone(),
            own_renders,
            transcripts: self.transcripts.clone(),
            rejected_frames: self.rejected,
        }
    }
}

/// Clients, relay and clock.
pub struct World {
    env: SimEnv,
    relay: SimRelay,
    clients: Vec<SimClient>,
}

impl World {
    /// Create `clients` disconnected sessions with default configuration.
    pub fn new(clients: usize, seed: u64) -> Self {
        Self::with_config(clients, seed, &SessionConfig::default())
    }

    /// Create `clients` disconnected sessions sharing `config`.
    pub fn with_config(clients: usize, seed: u64, config: &SessionConfig) -> Self {
        Self::with_relay(clients, seed, config, SimRelay::new())
    }

    /// Create the world around a preconfigured relay.
    pub fn with_relay(clients: usize, seed: u64, config: &SessionConfig, relay: SimRelay) -> Self {
        let env = SimEnv::with_seed(seed);
        let clients = (0..clients).map(|_| SimClient::new(env.clone(), config.clone())).collect();
        Self { env, relay, clients }
    }

    /// Shared clock and RNG.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// The relay.
    pub fn relay(&self) -> &SimRelay {
        &self.relay
    }

    /// Mutable access to the relay.
    pub fn relay_mut(&mut self) -> &mut SimRelay {
        &mut self.relay
    }

    /// All clients, by index.
    pub fn clients(&self) -> &[SimClient] {
        &self.clients
    }

    /// One client.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[allow(clippy::indexing_slicing)]
    pub fn client(&self, id: ClientId) -> &SimClient {
        &self.clients[id.0]
    }

    /// One client, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    #[allow(clippy::indexing_slicing)]
    pub fn client_mut(&mut self, id: ClientId) -> &mut SimClient {
        &mut self.clients[id.0]
    }

    /// Ask a client to connect without joining.
    pub fn connect(&mut self, id: ClientId) {
        self.feed(id, SessionEvent::Connect);
    }

    /// Ask a client to join.
    pub fn join(&mut self, id: ClientId, display_name: &str) {
        self.feed(id, SessionEvent::RequestJoin { display_name: display_name.to_owned() });
    }

    /// Ask a client to send a message.
    pub fn send(&mut self, id: ClientId, text: &str) {
        self.feed(id, SessionEvent::RequestSend { text: text.to_owned() });
    }

    /// Ask a client to leave.
    pub fn leave(&mut self, id: ClientId) {
        self.feed(id, SessionEvent::RequestLeave);
    }

    /// Hand a client a frame as if the relay had sent it.
    ///
    /// Ignored unless the client's transport is connected.
    pub fn inject_frame(&mut self, id: ClientId, raw: impl Into<String>) {
        if self.relay.is_connected(id.0) {
            self.feed(id, SessionEvent::FrameReceived(raw.into()));
        }
    }

    /// The relay drops one client's transport.
    pub fn drop_transport(&mut self, id: ClientId) {
        if self.relay.is_connected(id.0) {
            self.relay.disconnect(id.0);
            self.feed(id, SessionEvent::TransportClosed { reason: "dropped by relay".into() });
        }
    }

    /// Every transport drops and new ones fail until [`World::relay_restore`].
    pub fn relay_outage(&mut self) {
        self.relay.set_reachable(false);
        for slot in 0..self.clients.len() {
            if self.relay.is_connected(slot) {
                self.relay.disconnect(slot);
                self.feed(ClientId(slot), SessionEvent::TransportError {
                    reason: "relay unreachable".into(),
                });
            }
        }
    }

    /// The relay accepts transports again.
    pub fn relay_restore(&mut self) {
        self.relay.set_reachable(true);
    }

    /// Advance the clock and tick every client.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();
        for slot in 0..self.clients.len() {
            self.feed(ClientId(slot), SessionEvent::Tick { now });
        }
    }

    /// Deliver queued relay frames until nothing is left.
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_ROUNDS {
            if !self.relay.has_pending() {
                return;
            }
            for slot in 0..self.clients.len() {
                for raw in self.relay.take_outbox(slot) {
                    self.feed(ClientId(slot), SessionEvent::FrameReceived(raw));
                }
            }
        }
        tracing::warn!(rounds = MAX_SETTLE_ROUNDS, "relay still has frames after settling");
    }

    /// Apply a generated operation.
    pub fn apply(&mut self, operation: &Operation) {
        if self.clients.is_empty() {
            return;
        }
        let count = self.clients.len();
        let target = move |client: u8| ClientId(usize::from(client) % count);

        match operation {
            Operation::Join { client, name } => self.join(target(*client), &name.to_text()),
            Operation::Send { client, text } => self.send(target(*client), &text.to_text()),
            Operation::Leave { client } => self.leave(target(*client)),
            Operation::DropTransport { client } => self.drop_transport(target(*client)),
            Operation::RelayOutage => self.relay_outage(),
            Operation::RelayRestore => self.relay_restore(),
            Operation::AdvanceTime { secs } => self.advance(Duration::from_secs(u64::from(*secs))),
            Operation::Deliver => self.settle(),
            Operation::Garbage { client, payload } => {
                let raw = String::from_utf8_lossy(payload).into_owned();
                self.inject_frame(target(*client), raw);
            },
        }
    }

    /// Observable state of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_clients(
            self.clients.iter().enumerate().map(|(id, client)| client.snapshot(id)).collect(),
        )
    }

    /// Run an event and everything it causes to completion.
    fn feed(&mut self, id: ClientId, event: SessionEvent) {
        let slot = id.0;
        let Some(client) = self.clients.get_mut(slot) else {
            tracing::warn!(slot, "no such client");
            return;
        };
        let relay = &mut self.relay;
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let opened = matches!(event, SessionEvent::TransportOpened);
            let leaving = matches!(event, SessionEvent::RequestLeave);
            if let SessionEvent::FrameReceived(raw) = &event
                && let Ok(InboundEvent::RosterSnapshot { participants }) = InboundEvent::decode(raw)
            {
                client.last_snapshot = Some(participants);
            }

            let actions = client.session.handle(event);

            if opened && let Some(transcript) = client.transcripts.last_mut() {
                transcript.joined_at_open = client.session.identity().is_some();
            }
            if leaving {
                client.last_snapshot = None;
            }

            for action in actions {
                let Some(command) = action.deliver(&mut client.observer) else {
                    continue;
                };

                match command {
                    ConnectionAction::OpenTransport => {
                        if relay.connect(slot) {
                            client.transcripts.push(Transcript::default());
                            pending.push_back(SessionEvent::TransportOpened);
                        } else {
                            pending.push_back(SessionEvent::TransportError {
                                reason: "connection refused".into(),
                            });
                        }
                    },
                    ConnectionAction::Transmit(raw) => {
                        if let Ok(event) = OutboundEvent::decode(&raw)
                            && let Some(transcript) = client.transcripts.last_mut()
                        {
                            transcript.kinds.push(event.kind());
                        }
                        if let Err(e) = relay.receive(slot, &raw) {
                            tracing::warn!(slot, error = %e, "relay rejected frame");
                            client.rejected += 1;
                            pending.push_back(SessionEvent::TransportError { reason: e.to_string() });
                        }
                    },
                    ConnectionAction::CloseTransport { reason } => {
                        relay.disconnect(slot);
                        pending.push_back(SessionEvent::TransportClosed { reason });
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: ClientId = ClientId(0);
    const BOB: ClientId = ClientId(1);

    #[test]
    fn two_clients_see_each_other() {
        let mut world = World::new(2, 7);
        world.join(ALICE, "alice");
        world.join(BOB, "bob");
        world.settle();

        for id in [ALICE, BOB] {
            let names: Vec<_> =
                world.client(id).session().roster().iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, vec!["alice", "bob"]);
        }
    }

    #[test]
    fn messages_reach_others_and_render_once_locally() {
        let mut world = World::new(2, 7);
        world.join(ALICE, "alice");
        world.join(BOB, "bob");
        world.settle();

        world.send(ALICE, "hi bob");
        world.settle();

        assert_eq!(world.client(ALICE).observer().rendered_texts(), vec!["hi bob"]);
        assert_eq!(world.client(BOB).observer().rendered_texts(), vec!["hi bob"]);
        assert!(world.client(BOB).observer().rendered().all(|(_, is_mine)| !is_mine));
        assert_eq!(world.client(ALICE).session().pending_echoes(), 0);
    }

    #[test]
    fn join_during_outage_times_out() {
        let mut world = World::new(1, 7);
        world.relay_outage();

        world.join(ALICE, "alice");
        assert!(world.client(ALICE).session().is_joining());

        world.advance(Duration::from_secs(11));
        let client = world.client(ALICE);
        assert!(!client.session().is_joining());
        assert!(client.session().identity().is_none());
        let errors = client.observer().connectivity_errors();
        assert!(errors.iter().any(|m| m.contains("could not reach the relay")));
    }

    #[test]
    fn leave_forgets_roster() {
        let mut world = World::new(2, 7);
        world.join(ALICE, "alice");
        world.join(BOB, "bob");
        world.settle();

        world.leave(ALICE);
        world.settle();

        assert!(world.client(ALICE).session().roster().is_empty());
        assert!(world.client(ALICE).last_snapshot().is_none());
        let names: Vec<_> =
            world.client(BOB).session().roster().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bob"]);
    }
}
