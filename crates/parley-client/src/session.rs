//! Session state machine.
//!
//! The `Session` is the single owner of a chat session's state: the local
//! identity, the connection, the roster and the sends awaiting their echo.
//! Every event is processed to completion before the next one, so no state
//! is ever shared.
//!
//! # Join
//!
//! A join validates the name, mints an identity, and makes sure a transport
//! is on its way. Once the transport is open the identity is announced,
//! followed by a roster request. If the transport does not open within
//! [`SessionConfig::join_timeout`], the join is abandoned with a
//! connectivity error. A join made while the previous transport is still
//! closing waits for that close before connecting.
//!
//! # Echo suppression
//!
//! Sends are rendered immediately. Their correlation id is remembered until
//! the relay's echo comes back; that echo is then dropped instead of being
//! rendered a second time.

use std::time::Duration;

use parley_core::{
    CloseOutcome, Connection, ConnectionAction, ConnectionConfig, ConnectionState,
    MessageReconciler, PresenceTracker, env::Environment, reconciler::DEFAULT_PENDING_CAPACITY,
};
use parley_proto::{
    ChatMessage, CorrelationId, Identity, InboundEvent, OutboundEvent, Participant, ParticipantId,
};

use crate::{
    error::SessionError,
    event::{SessionAction, SessionEvent},
};

/// How long a join may wait for the transport to open.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Close reason used when the user leaves.
const LEAVE_REASON: &str = "leaving chat";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Connection lifecycle settings
    pub connection: ConnectionConfig,
    /// How long a join may wait for the transport to open
    pub join_timeout: Duration,
    /// Maximum sends tracked while awaiting their echo
    pub pending_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            pending_capacity: DEFAULT_PENDING_CAPACITY,
        }
    }
}

/// Join waiting for the transport to open.
#[derive(Debug, Clone)]
struct PendingJoin<I> {
    identity: Identity,
    deadline: I,
}

/// Chat session controller.
pub struct Session<E: Environment> {
    /// Environment for time and identifiers.
    env: E,

    /// Configuration.
    config: SessionConfig,

    /// Transport lifecycle.
    connection: Connection<E::Instant>,

    /// Last roster snapshot.
    presence: PresenceTracker,

    /// Sends awaiting their echo.
    reconciler: MessageReconciler,

    /// Identity after a completed join.
    identity: Option<Identity>,

    /// Join waiting for the transport.
    pending_join: Option<PendingJoin<E::Instant>>,
}

impl<E: Environment> Session<E> {
    /// Create a disconnected session.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            connection: Connection::new(config.connection.clone()),
            reconciler: MessageReconciler::with_capacity(config.pending_capacity),
            presence: PresenceTracker::new(),
            identity: None,
            pending_join: None,
            env,
            config,
        }
    }

    /// Process an event and return the resulting actions.
    ///
    /// Never fails: validation and connectivity problems are reported as
    /// [`SessionAction::ValidationError`] and
    /// [`SessionAction::ConnectivityError`], anything else is logged.
    pub fn handle(&mut self, event: SessionEvent<E::Instant>) -> Vec<SessionAction> {
        let result = match event {
            SessionEvent::Connect => self.handle_connect(),
            SessionEvent::RequestJoin { display_name } => self.handle_join(&display_name),
            SessionEvent::RequestSend { text } => Ok(self.handle_send(&text)),
            SessionEvent::RequestLeave => Ok(self.handle_leave()),
            SessionEvent::TransportOpened => self.handle_opened(),
            SessionEvent::TransportClosed { reason } => Ok(self.handle_lost(&reason, false)),
            SessionEvent::TransportError { reason } => Ok(self.handle_lost(&reason, true)),
            SessionEvent::FrameReceived(raw) => self.handle_frame(&raw),
            SessionEvent::Tick { now } => Ok(self.handle_tick(now)),
        };

        result.unwrap_or_else(|e| self.report(&e))
    }

    /// Identity after a completed join.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether a join is waiting for the transport.
    pub fn is_joining(&self) -> bool {
        self.pending_join.is_some()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// When the next reconnect attempt is due, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<E::Instant> {
        self.connection.reconnect_deadline()
    }

    /// Roster from the last snapshot, in relay order.
    pub fn roster(&self) -> &[Participant] {
        self.presence.current_roster()
    }

    /// Whether the roster predates the current transport.
    pub fn is_roster_stale(&self) -> bool {
        self.presence.is_stale()
    }

    /// Number of sends awaiting their echo.
    pub fn pending_echoes(&self) -> usize {
        self.reconciler.pending_count()
    }

    /// Whether `id` is awaiting its echo.
    pub fn is_echo_pending(&self, id: &CorrelationId) -> bool {
        self.reconciler.is_pending(id)
    }

    /// Configuration in use.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    fn handle_connect(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let now = self.env.now();
        Ok(transport(self.connection.connect(now)?))
    }

    fn handle_join(&mut self, display_name: &str) -> Result<Vec<SessionAction>, SessionError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyDisplayName);
        }
        if let Some(identity) = &self.identity {
            return Err(SessionError::AlreadyJoined { name: identity.name().to_owned() });
        }
        if let Some(pending) = &self.pending_join {
            return Err(SessionError::JoinInProgress { name: pending.identity.name().to_owned() });
        }

        let id = ParticipantId::new(self.env.random_uuid().to_string());
        let identity = Identity::new(id, name);
        let now = self.env.now();

        // A leave's close is still in flight; connect once it lands.
        let mut actions = if self.connection.state() == ConnectionState::Closing {
            Vec::new()
        } else {
            transport(self.connection.connect(now)?)
        };
        let announced = self.connection.announce(identity.clone())?;

        if self.connection.is_open() {
            actions.extend(transport(announced));
            actions.extend(self.enter(identity));
        } else {
            tracing::debug!(name, "join waiting for transport");
            let deadline = now + self.config.join_timeout;
            self.pending_join = Some(PendingJoin { identity, deadline });
        }

        Ok(actions)
    }

    fn enter(&mut self, identity: Identity) -> Vec<SessionAction> {
        tracing::info!(id = %identity.id(), name = identity.name(), "entered chat");
        self.identity = Some(identity.clone());
        vec![SessionAction::EnteredChat { identity }]
    }

    fn handle_send(&mut self, text: &str) -> Vec<SessionAction> {
        let text = text.trim();
        if text.is_empty() {
            return self.report(&SessionError::EmptyMessage);
        }
        let Some(identity) = &self.identity else {
            return self.report(&SessionError::NotJoined);
        };

        let correlation_id = CorrelationId::new(self.env.random_uuid().to_string());
        let message = ChatMessage::compose(text, identity, correlation_id.clone());
        self.reconciler.mark_pending(correlation_id.clone());

        let mut actions =
            vec![SessionAction::RenderMessage { message: message.clone(), is_mine: true }];

        match self.connection.send(&OutboundEvent::SendMessage(message)) {
            Ok(sent) => actions.extend(transport(sent)),
            Err(e) => {
                // Never transmitted, so no echo will come.
                self.reconciler.discard(&correlation_id);
                actions.extend(self.report(&SessionError::from(e)));
            },
        }

        actions
    }

    fn handle_leave(&mut self) -> Vec<SessionAction> {
        let mut actions = transport(self.connection.withdraw());
        actions.extend(transport(self.connection.disconnect(LEAVE_REASON)));

        let was_joined = self.identity.take().is_some();
        let was_joining = self.pending_join.take().is_some();
        self.reconciler.clear();

        if !self.presence.is_empty() {
            self.presence.clear();
            actions.push(SessionAction::RosterChanged(Vec::new()));
        }
        if was_joined || was_joining {
            tracing::info!("left chat");
            actions.push(SessionAction::LeftChat);
        }

        actions
    }

    fn handle_opened(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let mut actions = transport(self.connection.transport_opened()?);

        if let Some(pending) = self.pending_join.take() {
            actions.extend(self.enter(pending.identity));
        }

        Ok(actions)
    }

    fn handle_lost(&mut self, reason: &str, is_error: bool) -> Vec<SessionAction> {
        let now = self.env.now();
        let outcome = if is_error {
            self.connection.transport_error(now, reason)
        } else {
            self.connection.transport_closed(now, reason)
        };

        let message = match outcome {
            CloseOutcome::Planned if self.pending_join.is_some() => {
                tracing::debug!("previous transport closed; connecting for pending join");
                return match self.connection.connect(now) {
                    Ok(actions) => transport(actions),
                    Err(e) => self.report(&SessionError::from(e)),
                };
            },
            CloseOutcome::Planned | CloseOutcome::Ignored => return Vec::new(),
            CloseOutcome::Reconnecting { delay, .. } => {
                format!("connection to relay lost ({reason}); reconnecting in {delay:?}")
            },
            CloseOutcome::GaveUp { attempts } => {
                format!("connection to relay lost ({reason}); gave up after {attempts} attempts")
            },
        };

        self.presence.mark_stale();
        vec![SessionAction::ConnectivityError { message }]
    }

    fn handle_frame(&mut self, raw: &str) -> Result<Vec<SessionAction>, SessionError> {
        let event = InboundEvent::decode(raw)?;
        tracing::debug!(kind = event.kind(), "received");

        match event {
            InboundEvent::RosterSnapshot { participants } => {
                self.presence.apply_snapshot(participants);
                Ok(vec![SessionAction::RosterChanged(self.presence.current_roster().to_vec())])
            },
            InboundEvent::PresenceChanged { .. } => {
                Ok(transport(self.connection.send(&OutboundEvent::RequestRoster)?))
            },
            InboundEvent::MessageReceived(message) => Ok(self.handle_message(message)),
            InboundEvent::Unknown { kind } => {
                tracing::debug!(?kind, "ignoring unknown event");
                Ok(Vec::new())
            },
        }
    }

    fn handle_message(&mut self, message: ChatMessage) -> Vec<SessionAction> {
        let is_mine = self.identity.as_ref().is_some_and(|me| message.is_authored_by(me));

        if is_mine && self.reconciler.should_suppress_echo(&message) {
            tracing::debug!(correlation_id = ?message.correlation_id, "suppressed own echo");
            return Vec::new();
        }

        vec![SessionAction::RenderMessage { message, is_mine }]
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<SessionAction> {
        let mut actions = transport(self.connection.tick(now));

        if let Some(pending) = &self.pending_join
            && now >= pending.deadline
        {
            tracing::warn!(name = pending.identity.name(), "join timed out");
            self.pending_join = None;
            actions.extend(transport(self.connection.withdraw()));
            let timeout = self.config.join_timeout;
            actions.extend(self.report(&SessionError::JoinTimeout { timeout }));
        }

        actions
    }

    /// Turn an error into notifications, or log it.
    fn report(&self, error: &SessionError) -> Vec<SessionAction> {
        if error.is_validation() {
            vec![SessionAction::ValidationError { message: error.to_string() }]
        } else if error.is_connectivity() {
            vec![SessionAction::ConnectivityError { message: error.to_string() }]
        } else {
            tracing::warn!(error = %error, state = ?self.connection.state(), "session error");
            Vec::new()
        }
    }
}

fn transport(actions: Vec<ConnectionAction>) -> Vec<SessionAction> {
    actions.into_iter().map(SessionAction::from).collect()
}
