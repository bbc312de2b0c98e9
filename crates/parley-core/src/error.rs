//! Error types for the session core.
//!
//! Connection errors cover state-transition violations and encode failures.
//! Transport loss is not an error here: it arrives as an input event and is
//! answered with a reconnect.

use parley_proto::EncodeError;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Transmit attempted while the transport is not open
    #[error("no connection to the relay (transport is {state:?})")]
    NotConnected {
        /// State at the time of the attempt
        state: ConnectionState,
    },

    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Outbound event could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl ConnectionError {
    /// Returns true if this error may clear up on its own.
    ///
    /// `NotConnected` is transient: the reconnect loop will reopen the
    /// transport. State violations and encode failures are bugs.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }
}
