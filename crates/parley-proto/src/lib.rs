//! Parley wire protocol.
//!
//! JSON events exchanged with the relay. Every frame is a single text message
//! holding one JSON value. Outbound events are tagged with a `type` field;
//! inbound events arrive in one of three legacy shapes which decoding
//! normalizes into [`InboundEvent`]:
//!
//! - a bare array of participants (roster snapshot)
//! - an object with a `users` array (roster snapshot)
//! - an object with a `type` field (`user-joined`, `user-left`, `send`)
//!
//! # Invariants
//!
//! - Decoding never panics. Malformed input yields [`ParseError`], an object
//!   with an unrecognized or missing `type` yields [`InboundEvent::Unknown`].
//! - Encoding is total over well-formed events; every [`OutboundEvent`]
//!   variant maps to exactly one wire `type`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod inbound;
mod outbound;
mod types;

pub use errors::{EncodeError, ParseError};
pub use inbound::{InboundEvent, PresenceKind};
pub use outbound::OutboundEvent;
pub use types::{ChatMessage, CorrelationId, Identity, Participant, ParticipantId};
