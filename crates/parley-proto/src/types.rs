//! Identity, participant and message types shared by both directions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier.
///
/// Clients generate these as UUIDv4 strings, but the relay is free to echo
/// any string, so no format is enforced on decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender-generated id correlating a local render with its relay echo.
///
/// Carried on the wire as `tempId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap a raw correlation id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw correlation id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The local user's identity.
///
/// Created once when the user joins and immutable afterwards. The session
/// owns it for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: ParticipantId,
    name: String,
}

impl Identity {
    /// Create an identity from an id and an already-validated display name.
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Identifier announced to the relay.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A participant as asserted by the relay.
///
/// Same shape as [`Identity`], but owned by whoever produced the roster or
/// message rather than by the local session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Participant identifier.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
}

impl Participant {
    /// Create a participant.
    pub fn new(id: ParticipantId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl From<&Identity> for Participant {
    fn from(identity: &Identity) -> Self {
        Self { id: identity.id.clone(), name: identity.name.clone() }
    }
}

/// A chat message, either composed locally or received from the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message body.
    pub text: String,
    /// Who wrote it.
    pub author: Participant,
    /// Correlation id assigned by the sender.
    ///
    /// Always present on locally composed messages. Messages relayed from
    /// other clients may omit it.
    pub correlation_id: Option<CorrelationId>,
}

impl ChatMessage {
    /// Compose a message from the local identity.
    pub fn compose(text: impl Into<String>, author: &Identity, correlation_id: CorrelationId) -> Self {
        Self {
            text: text.into(),
            author: Participant::from(author),
            correlation_id: Some(correlation_id),
        }
    }

    /// Whether `identity` wrote this message.
    pub fn is_authored_by(&self, identity: &Identity) -> bool {
        self.author.id == identity.id
    }
}
