//! Transport lifecycle state machine.
//!
//! Owns the connection state, the reconnect schedule and the announced
//! presence. Uses the action pattern: methods take time as input and return
//! actions for the driver to execute, so the machine itself performs no I/O.
//!
//! # State Machine
//!
//! ```text
//!                 connect / reconnect due
//! ┌──────────────┐ ─────────────────────> ┌────────────┐  opened   ┌──────┐
//! │ Disconnected │                        │ Connecting │ ────────> │ Open │
//! └──────────────┘ <───────────────────── └────────────┘           └──────┘
//!     ↑    ↑        lost (reconnect scheduled)                       │  │
//!     │    └─────────────────────────────────────────────────────────┘  │
//!     │                       lost (reconnect scheduled)                │
//!     │ closed   ┌─────────┐            disconnect                      │
//!     └───────── │ Closing │ <──────────────────────────────────────────┘
//!                └─────────┘
//! ```
//!
//! Every unplanned loss schedules exactly one reconnect. A planned close
//! (through [`Connection::disconnect`]) never does. Whenever the transport
//! opens, the announced identity is re-sent before a roster request, so the
//! relay learns who we are before anything else on the new transport.

use std::time::{Duration, Instant};

use parley_proto::{Identity, OutboundEvent};

use crate::{env::ClockInstant, error::ConnectionError};

/// Delay before reconnecting after an unplanned loss.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Time allowed for a transport to open before the attempt is abandoned.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Growth factor used by [`ReconnectPolicy::exponential`].
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Actions returned by the connection state machine.
///
/// The driver executes these:
/// - `OpenTransport`: start opening a transport to the relay
/// - `Transmit`: write the text frame to the open transport
/// - `CloseTransport`: tear the transport down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Begin opening a transport
    OpenTransport,

    /// Send this JSON text frame
    Transmit(String),

    /// Close the transport
    CloseTransport {
        /// Reason for closing
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport, possibly with a reconnect scheduled
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport is open; transmits are allowed
    Open,
    /// Planned close in progress
    Closing,
}

/// What a transport loss led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The close was requested through [`Connection::disconnect`]
    Planned,
    /// Already disconnected; nothing changed
    Ignored,
    /// A reconnect is scheduled
    Reconnecting {
        /// Time until the attempt
        delay: Duration,
        /// 1-based attempt number since the transport was last open
        attempt: u32,
    },
    /// The attempt cap was reached; no reconnect is scheduled
    GaveUp {
        /// Attempts made before giving up
        attempts: u32,
    },
}

/// Reconnect timing.
///
/// The delay for attempt `n` (0-based) is `initial_delay * multiplier^n`,
/// capped at `max_delay`. A multiplier of 1 gives a fixed delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: u32,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Give up after this many consecutive attempts (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Same delay every time, retrying forever.
    pub fn fixed(delay: Duration) -> Self {
        Self { initial_delay: delay, multiplier: 1, max_delay: delay, max_attempts: None }
    }

    /// Doubling delay starting at `initial`, capped at `max`.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay: initial,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: max.max(initial),
            max_attempts: None,
        }
    }

    /// Stop after `attempts` consecutive failures.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay before attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.multiplier
            .checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Reconnect timing after unplanned loss
    pub reconnect: ReconnectPolicy,
    /// How long a transport may stay `Connecting`
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { reconnect: ReconnectPolicy::default(), connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

/// Connection state machine
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: ClockInstant,
{
    state: ConnectionState,
    config: ConnectionConfig,
    /// Identity to (re-)announce whenever the transport opens
    presence: Option<Identity>,
    /// When the scheduled reconnect is due
    reconnect_at: Option<I>,
    /// Consecutive attempts since the transport was last open
    attempts: u32,
    /// When the current `Connecting` attempt began
    connecting_since: Option<I>,
}

impl<I> Connection<I>
where
    I: ClockInstant,
{
    /// Create a connection in [`ConnectionState::Disconnected`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            presence: None,
            reconnect_at: None,
            attempts: 0,
            connecting_since: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether transmits are currently allowed.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Identity announced on every open, if any.
    pub fn presence(&self) -> Option<&Identity> {
        self.presence.as_ref()
    }

    /// When the scheduled reconnect fires, if one is scheduled.
    pub fn reconnect_deadline(&self) -> Option<I> {
        self.reconnect_at
    }

    /// Consecutive reconnect attempts since the transport was last open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Ensure a transport is being established.
    ///
    /// Starts connecting from `Disconnected` (cancelling any scheduled
    /// reconnect and resetting the attempt counter). A no-op while already
    /// `Connecting` or `Open`.
    pub fn connect(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Disconnected => {
                self.reconnect_at = None;
                self.attempts = 0;
                Ok(self.begin_connecting(now))
            },
            ConnectionState::Connecting | ConnectionState::Open => Ok(Vec::new()),
            ConnectionState::Closing => {
                Err(ConnectionError::InvalidState { state: self.state, operation: "connect" })
            },
        }
    }

    /// The transport finished opening.
    ///
    /// Returns the join announcement (when an identity is present) followed
    /// by a roster request.
    pub fn transport_opened(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "complete transport open",
            });
        }

        self.state = ConnectionState::Open;
        self.connecting_since = None;
        self.attempts = 0;
        tracing::info!(announce = self.presence.is_some(), "transport open");

        let mut actions = Vec::with_capacity(2);
        if let Some(identity) = &self.presence {
            actions.push(ConnectionAction::Transmit(OutboundEvent::Join(identity.clone()).encode()?));
        }
        actions.push(ConnectionAction::Transmit(OutboundEvent::RequestRoster.encode()?));
        Ok(actions)
    }

    /// The transport closed.
    pub fn transport_closed(&mut self, now: I, reason: &str) -> CloseOutcome {
        self.transport_lost(now, reason)
    }

    /// The transport reported an error. Treated like a close.
    pub fn transport_error(&mut self, now: I, reason: &str) -> CloseOutcome {
        self.transport_lost(now, reason)
    }

    fn transport_lost(&mut self, now: I, reason: &str) -> CloseOutcome {
        match self.state {
            ConnectionState::Disconnected => CloseOutcome::Ignored,
            ConnectionState::Closing => {
                self.state = ConnectionState::Disconnected;
                tracing::debug!(reason, "transport closed");
                CloseOutcome::Planned
            },
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state = ConnectionState::Disconnected;
                self.connecting_since = None;

                if let Some(max) = self.config.reconnect.max_attempts
                    && self.attempts >= max
                {
                    tracing::warn!(attempts = self.attempts, reason, "giving up on relay");
                    return CloseOutcome::GaveUp { attempts: self.attempts };
                }

                let delay = self.config.reconnect.delay_for(self.attempts);
                self.attempts = self.attempts.saturating_add(1);
                self.reconnect_at = Some(now + delay);
                tracing::warn!(?delay, attempt = self.attempts, reason, "transport lost");
                CloseOutcome::Reconnecting { delay, attempt: self.attempts }
            },
        }
    }

    /// Record the identity to announce and announce it if already open.
    pub fn announce(&mut self, identity: Identity) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let actions = if self.is_open() {
            vec![
                ConnectionAction::Transmit(OutboundEvent::Join(identity.clone()).encode()?),
                ConnectionAction::Transmit(OutboundEvent::RequestRoster.encode()?),
            ]
        } else {
            Vec::new()
        };
        self.presence = Some(identity);
        Ok(actions)
    }

    /// Forget the announced identity, sending a best-effort `exit` if open.
    pub fn withdraw(&mut self) -> Vec<ConnectionAction> {
        let Some(identity) = self.presence.take() else {
            return Vec::new();
        };
        if !self.is_open() {
            return Vec::new();
        }

        match OutboundEvent::Leave(identity).encode() {
            Ok(raw) => vec![ConnectionAction::Transmit(raw)],
            Err(e) => {
                tracing::warn!(error = %e, "dropping leave announcement");
                Vec::new()
            },
        }
    }

    /// Encode and transmit an event.
    ///
    /// Fails with [`ConnectionError::NotConnected`] unless `Open`; nothing
    /// is queued for later.
    pub fn send(&self, event: &OutboundEvent) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::NotConnected { state: self.state });
        }
        tracing::debug!(kind = event.kind(), "transmit");
        Ok(vec![ConnectionAction::Transmit(event.encode()?)])
    }

    /// Close the transport on purpose and cancel any scheduled reconnect.
    pub fn disconnect(&mut self, reason: &str) -> Vec<ConnectionAction> {
        self.reconnect_at = None;
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                self.state = ConnectionState::Closing;
                self.connecting_since = None;
                vec![ConnectionAction::CloseTransport { reason: reason.to_owned() }]
            },
            ConnectionState::Disconnected | ConnectionState::Closing => Vec::new(),
        }
    }

    /// Drive time-based behavior.
    ///
    /// Fires a due reconnect, and abandons a `Connecting` attempt that has
    /// outlived the connect timeout. The abandoned attempt's close comes back
    /// through [`Connection::transport_closed`] like any other loss.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Disconnected => match self.reconnect_at {
                Some(due) if now >= due => {
                    self.reconnect_at = None;
                    tracing::debug!(attempt = self.attempts, "reconnecting");
                    self.begin_connecting(now)
                },
                _ => Vec::new(),
            },
            ConnectionState::Connecting => match self.connecting_since {
                Some(since) if now - since >= self.config.connect_timeout => {
                    self.connecting_since = None;
                    let elapsed = now - since;
                    tracing::warn!(?elapsed, "connect attempt timed out");
                    vec![ConnectionAction::CloseTransport {
                        reason: format!("connect timeout after {elapsed:?}"),
                    }]
                },
                _ => Vec::new(),
            },
            ConnectionState::Open | ConnectionState::Closing => Vec::new(),
        }
    }

    fn begin_connecting(&mut self, now: I) -> Vec<ConnectionAction> {
        self.state = ConnectionState::Connecting;
        self.connecting_since = Some(now);
        vec![ConnectionAction::OpenTransport]
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::ParticipantId;

    use super::*;

    #[allow(clippy::disallowed_methods)]
    fn t0() -> Instant {
        Instant::now()
    }

    fn alice() -> Identity {
        Identity::new(ParticipantId::new("u-alice"), "alice")
    }

    fn open(conn: &mut Connection, now: Instant) -> Vec<ConnectionAction> {
        assert_eq!(conn.connect(now).unwrap(), vec![ConnectionAction::OpenTransport]);
        conn.transport_opened().unwrap()
    }

    fn transmitted(actions: &[ConnectionAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                ConnectionAction::Transmit(raw) => Some(raw.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn open_without_presence_requests_roster_only() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let actions = open(&mut conn, t0());

        assert_eq!(conn.state(), ConnectionState::Open);
        assert_eq!(transmitted(&actions), vec![r#"{"type":"get-users"}"#]);
    }

    #[test]
    fn connect_is_idempotent() {
        let mut conn: Connection = Connection::new(ConnectionConfig::default());
        let now = t0();

        assert_eq!(conn.connect(now).unwrap().len(), 1);
        assert!(conn.connect(now).unwrap().is_empty());
        conn.transport_opened().unwrap();
        assert!(conn.connect(now).unwrap().is_empty());
    }

    #[test]
    fn announce_while_open_transmits_join_then_roster_request() {
        let mut conn = Connection::new(ConnectionConfig::default());
        open(&mut conn, t0());

        let actions = conn.announce(alice()).unwrap();
        let frames = transmitted(&actions);

        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""type":"new-user""#));
        assert_eq!(frames[1], r#"{"type":"get-users"}"#);
    }

    #[test]
    fn announce_while_closed_waits_for_open() {
        let mut conn = Connection::new(ConnectionConfig::default());

        assert!(conn.announce(alice()).unwrap().is_empty());

        let frames = open(&mut conn, t0());
        let frames = transmitted(&frames);
        assert!(frames[0].contains(r#""type":"new-user""#));
        assert_eq!(frames[1], r#"{"type":"get-users"}"#);
    }

    #[test]
    fn send_requires_open() {
        let mut conn: Connection = Connection::new(ConnectionConfig::default());

        let err = conn.send(&OutboundEvent::RequestRoster).unwrap_err();
        assert_eq!(err, ConnectionError::NotConnected { state: ConnectionState::Disconnected });

        conn.connect(t0()).unwrap();
        let err = conn.send(&OutboundEvent::RequestRoster).unwrap_err();
        assert_eq!(err, ConnectionError::NotConnected { state: ConnectionState::Connecting });
    }

    #[test]
    fn loss_schedules_exactly_one_reconnect() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let now = t0();
        open(&mut conn, now);

        let outcome = conn.transport_error(now, "reset");
        assert_eq!(
            outcome,
            CloseOutcome::Reconnecting { delay: DEFAULT_RECONNECT_DELAY, attempt: 1 }
        );
        // A close following the error must not schedule a second attempt.
        assert_eq!(conn.transport_closed(now, "reset"), CloseOutcome::Ignored);
        assert_eq!(conn.reconnect_deadline(), Some(now + DEFAULT_RECONNECT_DELAY));

        assert!(conn.tick(now + Duration::from_secs(4)).is_empty());
        assert_eq!(
            conn.tick(now + DEFAULT_RECONNECT_DELAY),
            vec![ConnectionAction::OpenTransport]
        );
        let attempt = now + DEFAULT_RECONNECT_DELAY;
        assert!(conn.tick(attempt + Duration::from_secs(1)).is_empty());
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // Past the connect timeout the attempt is abandoned, not retried.
        let actions = conn.tick(attempt + DEFAULT_CONNECT_TIMEOUT);
        assert!(matches!(actions.as_slice(), [ConnectionAction::CloseTransport { .. }]));
        assert!(conn.tick(attempt + DEFAULT_CONNECT_TIMEOUT).is_empty());
    }

    #[test]
    fn reopen_reannounces_presence_first() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let now = t0();
        conn.announce(alice()).unwrap();
        open(&mut conn, now);

        conn.transport_closed(now, "gone");
        conn.tick(now + DEFAULT_RECONNECT_DELAY);
        let actions = conn.transport_opened().unwrap();
        let frames = transmitted(&actions);

        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains(r#""type":"new-user""#));
        assert_eq!(frames[1], r#"{"type":"get-users"}"#);
    }

    #[test]
    fn planned_disconnect_does_not_reconnect() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let now = t0();
        open(&mut conn, now);

        let actions = conn.disconnect("leave");
        assert_eq!(actions, vec![ConnectionAction::CloseTransport { reason: "leave".into() }]);
        assert_eq!(conn.state(), ConnectionState::Closing);

        assert_eq!(conn.transport_closed(now, "leave"), CloseOutcome::Planned);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.tick(now + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn disconnect_cancels_scheduled_reconnect() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let now = t0();
        open(&mut conn, now);
        conn.transport_closed(now, "gone");

        assert!(conn.disconnect("leave").is_empty());
        assert_eq!(conn.reconnect_deadline(), None);
        assert!(conn.tick(now + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn withdraw_sends_exit_only_when_open() {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.announce(alice()).unwrap();
        assert!(conn.withdraw().is_empty());
        assert!(conn.presence().is_none());

        conn.announce(alice()).unwrap();
        open(&mut conn, t0());
        let actions = conn.withdraw();
        assert!(transmitted(&actions)[0].contains(r#""type":"exit""#));
        assert!(conn.withdraw().is_empty());
    }

    #[test]
    fn connect_timeout_abandons_attempt() {
        let config = ConnectionConfig {
            connect_timeout: Duration::from_secs(3),
            ..ConnectionConfig::default()
        };
        let mut conn: Connection = Connection::new(config);
        let now = t0();
        conn.connect(now).unwrap();

        assert!(conn.tick(now + Duration::from_secs(2)).is_empty());
        let actions = conn.tick(now + Duration::from_secs(3));
        assert!(matches!(actions.as_slice(), [ConnectionAction::CloseTransport { .. }]));
        // Fires once per attempt.
        assert!(conn.tick(now + Duration::from_secs(4)).is_empty());

        let outcome = conn.transport_closed(now + Duration::from_secs(3), "connect timeout");
        assert!(matches!(outcome, CloseOutcome::Reconnecting { attempt: 1, .. }));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = ReconnectPolicy::exponential(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(200), Duration::from_secs(10));
    }

    #[test]
    fn failed_attempts_grow_the_delay() {
        let config = ConnectionConfig {
            reconnect: ReconnectPolicy::exponential(Duration::from_secs(1), Duration::from_secs(60)),
            ..ConnectionConfig::default()
        };
        let mut conn = Connection::new(config);
        let mut now = t0();
        open(&mut conn, now);

        let mut delays = Vec::new();
        for _ in 0..3 {
            let CloseOutcome::Reconnecting { delay, .. } = conn.transport_error(now, "refused")
            else {
                panic!("expected reconnect");
            };
            delays.push(delay);
            now += delay;
            assert_eq!(conn.tick(now), vec![ConnectionAction::OpenTransport]);
        }

        assert_eq!(
            delays,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );

        // Success resets the backoff.
        conn.transport_opened().unwrap();
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn attempt_cap_gives_up() {
        let config = ConnectionConfig {
            reconnect: ReconnectPolicy::fixed(Duration::from_secs(1)).with_max_attempts(2),
            ..ConnectionConfig::default()
        };
        let mut conn = Connection::new(config);
        let mut now = t0();
        open(&mut conn, now);

        for attempt in 1..=2 {
            assert!(matches!(
                conn.transport_closed(now, "refused"),
                CloseOutcome::Reconnecting { attempt: a, .. } if a == attempt
            ));
            now += Duration::from_secs(1);
            conn.tick(now);
        }

        assert_eq!(conn.transport_closed(now, "refused"), CloseOutcome::GaveUp { attempts: 2 });
        assert_eq!(conn.reconnect_deadline(), None);
        assert!(conn.tick(now + Duration::from_secs(60)).is_empty());

        // An explicit connect starts over.
        assert_eq!(conn.connect(now).unwrap(), vec![ConnectionAction::OpenTransport]);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn open_outside_connecting_is_rejected() {
        let mut conn: Connection = Connection::new(ConnectionConfig::default());

        let err = conn.transport_opened().unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidState { .. }));
    }
}
