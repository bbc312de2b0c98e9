//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. Each frontend implements the trait to provide its own
//! input and transport, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use parley_client::SessionEvent;

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Enter the chat under this name.
    Join {
        /// Name as typed
        display_name: String,
    },
    /// Send a message.
    Send {
        /// Message as typed
        text: String,
    },
    /// Leave the chat but keep running.
    Leave,
    /// Leave and stop the runtime.
    Quit,
}

/// Input produced by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// User intent
    Intent(Intent),
    /// The transport requested by `open_transport` is open
    TransportOpened,
    /// The transport closed
    TransportClosed {
        /// Close reason
        reason: String,
    },
    /// The transport failed
    TransportError {
        /// Error description
        reason: String,
    },
    /// A text frame arrived
    FrameReceived(String),
}

impl DriverEvent {
    /// Translate into a session event. `None` means stop.
    pub fn into_session_event<I>(self) -> Option<SessionEvent<I>> {
        Some(match self {
            Self::Intent(Intent::Join { display_name }) => SessionEvent::RequestJoin { display_name },
            Self::Intent(Intent::Send { text }) => SessionEvent::RequestSend { text },
            Self::Intent(Intent::Leave) => SessionEvent::RequestLeave,
            Self::Intent(Intent::Quit) => return None,
            Self::TransportOpened => SessionEvent::TransportOpened,
            Self::TransportClosed { reason } => SessionEvent::TransportClosed { reason },
            Self::TransportError { reason } => SessionEvent::TransportError { reason },
            Self::FrameReceived(raw) => SessionEvent::FrameReceived(raw),
        })
    }
}

/// Abstracts I/O operations for the runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in production and simulation.
///
/// # Contract
///
/// - `open_transport` only starts opening; completion or failure is reported
///   later through `poll_event` as `TransportOpened`, `TransportError` or
///   `TransportClosed`.
/// - After `close_transport` (or a new `open_transport`), no further events
///   from the old transport may be reported.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Poll for the next input event.
    ///
    /// Returns `None` if nothing arrived within the driver's poll interval,
    /// so the runtime can tick. Errors are fatal to the runtime.
    fn poll_event(&mut self) -> impl Future<Output = Result<Option<DriverEvent>, Self::Error>> + Send;

    /// Start opening a transport to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the attempt could not even be started. The
    /// runtime treats this as a transport error.
    fn open_transport(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Write a text frame to the open transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is gone. The runtime treats this as
    /// a transport error.
    fn transmit(&mut self, raw: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the transport.
    fn close_transport(&mut self, reason: &str) -> impl Future<Output = ()> + Send;

    /// Release all resources.
    fn stop(&mut self);
}
