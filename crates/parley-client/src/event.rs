//! Session events and actions.

use parley_core::ConnectionAction;
use parley_proto::{ChatMessage, Identity, Participant};

/// Events the caller feeds into the session.
///
/// The caller is responsible for:
/// - Forwarding user intents (join, send, leave)
/// - Reporting transport lifecycle and received frames
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulated time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent<I = std::time::Instant> {
    /// Start connecting to the relay ahead of any join.
    Connect,

    /// User wants to enter the chat.
    RequestJoin {
        /// Name as typed; trimmed before use.
        display_name: String,
    },

    /// User wants to send a message.
    RequestSend {
        /// Message body as typed; trimmed before use.
        text: String,
    },

    /// User is leaving (or the application is shutting down).
    RequestLeave,

    /// The transport requested by `OpenTransport` is open.
    TransportOpened,

    /// The transport closed.
    TransportClosed {
        /// Close reason reported by the transport
        reason: String,
    },

    /// The transport failed.
    TransportError {
        /// Error reported by the transport
        reason: String,
    },

    /// A text frame arrived from the relay.
    FrameReceived(String),

    /// Time tick for reconnect and timeout processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Actions the session asks the caller to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a transport to the relay.
    OpenTransport,

    /// Write this text frame to the open transport.
    Transmit(String),

    /// Close the transport. The caller reports completion with
    /// [`SessionEvent::TransportClosed`].
    CloseTransport {
        /// Reason for closing
        reason: String,
    },

    /// The roster was replaced.
    RosterChanged(Vec<Participant>),

    /// Show a message.
    RenderMessage {
        /// The message
        message: ChatMessage,
        /// Whether the local user wrote it
        is_mine: bool,
    },

    /// The join completed; the identity is announced to the relay.
    EnteredChat {
        /// The identity now in use
        identity: Identity,
    },

    /// The user left the chat.
    LeftChat,

    /// The relay is unreachable or the connection dropped.
    ConnectivityError {
        /// Human-readable description
        message: String,
    },

    /// The user supplied invalid input.
    ValidationError {
        /// Human-readable description
        message: String,
    },
}

impl SessionAction {
    /// Whether this action is for the transport rather than the UI.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::OpenTransport | Self::Transmit(_) | Self::CloseTransport { .. })
    }
}

impl From<ConnectionAction> for SessionAction {
    fn from(action: ConnectionAction) -> Self {
        match action {
            ConnectionAction::OpenTransport => Self::OpenTransport,
            ConnectionAction::Transmit(raw) => Self::Transmit(raw),
            ConnectionAction::CloseTransport { reason } => Self::CloseTransport { reason },
        }
    }
}
