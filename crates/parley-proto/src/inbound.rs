//! Relay-to-client events.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    errors::{EncodeError, ParseError},
    types::{ChatMessage, CorrelationId, Participant},
};

/// Presence hint direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    /// Someone joined (`user-joined`).
    Joined,
    /// Someone left (`user-left`).
    Left,
}

/// Events received from the relay, normalized from the legacy wire shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Authoritative list of present participants, in relay order.
    RosterSnapshot {
        /// Participants as sent by the relay
        participants: Vec<Participant>,
    },

    /// Presence changed. Carries no roster; the client re-requests one.
    PresenceChanged {
        /// Whether someone joined or left
        kind: PresenceKind,
    },

    /// A chat message broadcast by the relay, possibly our own echo.
    MessageReceived(ChatMessage),

    /// Well-formed object the client does not understand.
    Unknown {
        /// The `type` field, if there was one
        kind: Option<String>,
    },
}

/// Body of a relayed `send`.
#[derive(Debug, Deserialize)]
struct Relayed {
    message: String,
    user: Participant,
    #[serde(rename = "tempId", default)]
    temp_id: Option<CorrelationId>,
}

impl InboundEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::RosterSnapshot { .. } => "roster",
            Self::PresenceChanged { kind: PresenceKind::Joined } => "user-joined",
            Self::PresenceChanged { kind: PresenceKind::Left } => "user-left",
            Self::MessageReceived(_) => "send",
            Self::Unknown { kind } => kind.as_deref().unwrap_or("unknown"),
        }
    }

    /// Decode a text frame from the relay.
    ///
    /// The checks run in a fixed order: a bare array, then an object with a
    /// `users` key, then the `type` discriminator.
    pub fn decode(raw: &str) -> Result<Self, ParseError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ParseError::Syntax(e.to_string()))?;

        match value {
            Value::Array(_) => Self::roster(value),
            Value::Object(mut map) => {
                if let Some(users) = map.remove("users") {
                    return Self::roster(users);
                }
                Self::typed(map)
            },
            Value::Null => Err(ParseError::UnexpectedShape { found: "null" }),
            Value::Bool(_) => Err(ParseError::UnexpectedShape { found: "boolean" }),
            Value::Number(_) => Err(ParseError::UnexpectedShape { found: "number" }),
            Value::String(_) => Err(ParseError::UnexpectedShape { found: "string" }),
        }
    }

    fn roster(users: Value) -> Result<Self, ParseError> {
        let participants: Vec<Participant> =
            serde_json::from_value(users).map_err(|e| ParseError::malformed("roster", &e))?;
        Ok(Self::RosterSnapshot { participants })
    }

    fn typed(map: Map<String, Value>) -> Result<Self, ParseError> {
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Ok(Self::Unknown { kind: None }),
        };

        match kind.as_str() {
            "user-joined" => Ok(Self::PresenceChanged { kind: PresenceKind::Joined }),
            "user-left" => Ok(Self::PresenceChanged { kind: PresenceKind::Left }),
            "send" => {
                let relayed: Relayed = serde_json::from_value(Value::Object(map))
                    .map_err(|e| ParseError::malformed("send", &e))?;
                Ok(Self::MessageReceived(ChatMessage {
                    text: relayed.message,
                    author: relayed.user,
                    correlation_id: relayed.temp_id,
                }))
            },
            _ => Ok(Self::Unknown { kind: Some(kind) }),
        }
    }

    /// Encode as the relay would send it.
    ///
    /// Rosters are emitted as a bare array. Used by the simulated relay.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let value = match self {
            Self::RosterSnapshot { participants } => serde_json::to_value(participants)
                .map_err(|e| EncodeError { kind: "roster", reason: e.to_string() })?,
            Self::PresenceChanged { .. } => {
                let mut map = Map::new();
                map.insert("type".into(), Value::String(self.kind().to_owned()));
                Value::Object(map)
            },
            Self::MessageReceived(message) => {
                let user = serde_json::to_value(&message.author)
                    .map_err(|e| EncodeError { kind: "send", reason: e.to_string() })?;
                let mut map = Map::new();
                map.insert("type".into(), Value::String("send".into()));
                map.insert("message".into(), Value::String(message.text.clone()));
                map.insert("user".into(), user);
                if let Some(id) = &message.correlation_id {
                    map.insert("tempId".into(), Value::String(id.as_str().to_owned()));
                }
                Value::Object(map)
            },
            Self::Unknown { kind } => {
                let mut map = Map::new();
                if let Some(kind) = kind {
                    map.insert("type".into(), Value::String(kind.clone()));
                }
                Value::Object(map)
            },
        };

        Ok(value.to_string())
    }
}
