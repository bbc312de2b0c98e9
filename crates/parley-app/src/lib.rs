//! Application layer for Parley
//!
//! A generic runtime that feeds a [`parley_client::Session`] from a
//! [`Driver`] and executes what comes back, enabling deterministic
//! simulation testing with the same code that runs in production.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::WsDriver`]: WebSocket driver for a real relay
//! - [`system_env::SystemEnv`]: system clock and OS randomness

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod runtime;

#[cfg(feature = "transport")]
pub mod system_env;
#[cfg(feature = "transport")]
pub mod transport;

pub use driver::{Driver, DriverEvent, Intent};
pub use runtime::Runtime;
