//! Core state machines for a Parley chat session.
//!
//! Everything here is Sans-IO: methods take the current time as a parameter
//! and return actions for a driver to execute. Nothing in this crate touches
//! a socket, a clock or an entropy source directly; those come from an
//! [`env::Environment`].
//!
//! # Components
//!
//! - [`Connection`]: transport lifecycle and reconnect scheduling
//! - [`PresenceTracker`]: last roster snapshot received from the relay
//! - [`MessageReconciler`]: correlation ids awaiting their relay echo

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod presence;
pub mod reconciler;

pub use connection::{
    CloseOutcome, Connection, ConnectionAction, ConnectionConfig, ConnectionState,
    ReconnectPolicy,
};
pub use env::{ClockInstant, Environment};
pub use error::ConnectionError;
pub use presence::PresenceTracker;
pub use reconciler::MessageReconciler;
