//! Session errors.

use std::time::Duration;

use parley_core::ConnectionError;
use parley_proto::ParseError;
use thiserror::Error;

/// Errors raised while handling a session event.
///
/// These never cross [`crate::Session::handle`]: validation and
/// connectivity errors become notification actions, the rest are logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Display name was empty after trimming
    #[error("display name must not be empty")]
    EmptyDisplayName,

    /// Message text was empty after trimming
    #[error("message must not be empty")]
    EmptyMessage,

    /// Send attempted before joining
    #[error("join the chat before sending messages")]
    NotJoined,

    /// Join attempted while already joined
    #[error("already joined as {name}")]
    AlreadyJoined {
        /// Current display name
        name: String,
    },

    /// Join attempted while another join waits for the transport
    #[error("already joining as {name}")]
    JoinInProgress {
        /// Display name of the pending join
        name: String,
    },

    /// The transport did not open in time for a join
    #[error("could not reach the relay within {timeout:?}")]
    JoinTimeout {
        /// Configured join timeout
        timeout: Duration,
    },

    /// Connection state machine rejected the operation
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Inbound frame could not be decoded
    #[error("dropping inbound frame: {0}")]
    Parse(#[from] ParseError),
}

impl SessionError {
    /// Whether the user supplied bad input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyDisplayName
                | Self::EmptyMessage
                | Self::NotJoined
                | Self::AlreadyJoined { .. }
                | Self::JoinInProgress { .. }
        )
    }

    /// Whether the relay is unreachable right now.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::JoinTimeout { .. } => true,
            Self::Connection(e) => e.is_transient(),
            _ => false,
        }
    }
}
