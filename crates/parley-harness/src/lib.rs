//! Deterministic simulation harness for Parley session testing.
//!
//! Virtual-clock [`SimEnv`], scripted [`SimDriver`], and an in-memory
//! [`SimRelay`] that speaks the relay protocol. A [`World`] wires several
//! sessions to one relay so multi-client behavior can be tested without a
//! network or wall-clock time.
//!
//! # Model-Based Testing
//!
//! [`Operation`] values are generated randomly (by proptest or a fuzzer) and
//! applied to a [`World`]. After each operation the world's
//! [`SystemSnapshot`] is checked against the invariant registry.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Use [`InvariantRegistry::standard()`] for the session invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod operation;
pub mod recorder;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_relay;
pub mod world;

pub use invariants::{
    AnnounceBeforeTraffic, ClientSnapshot, Invariant, InvariantRegistry, InvariantResult,
    NoDuplicateSelfEcho, RosterMatchesSnapshot, SystemSnapshot, Transcript, TransmitOnlyWhenOpen,
    Violation,
};
pub use operation::{Operation, SmallText};
pub use recorder::{Notification, RecordingObserver};
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::SimEnv;
pub use sim_relay::{RelayError, RosterShape, SimRelay};
pub use world::{ClientId, SimClient, World};
