//! Client
//!
//! Action-based session controller for a Parley chat. Owns the local
//! identity, the connection, the roster and the pending-echo set, and turns
//! user intents and transport events into transport actions and UI
//! notifications.
//!
//! # Architecture
//!
//! The session follows the same Sans-IO and action-based patterns as
//! [`parley_core`]. It receives events ([`SessionEvent`]), processes them
//! through pure state machine logic, and returns actions ([`SessionAction`])
//! for the caller to execute. Errors never escape [`Session::handle`]; they
//! come back as notification actions or are logged and dropped.
//!
//! # Components
//!
//! - [`Session`]: the session state machine
//! - [`SessionEvent`]: intents and transport events fed into the session
//! - [`SessionAction`]: transport commands and UI notifications
//! - [`SessionObserver`]: the UI-facing notification interface

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod observer;
mod session;

pub use error::SessionError;
pub use event::{SessionAction, SessionEvent};
pub use observer::SessionObserver;
pub use parley_core::{ConnectionState, env::Environment};
pub use session::{DEFAULT_JOIN_TIMEOUT, Session, SessionConfig};
