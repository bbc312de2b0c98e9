//! Client-to-relay events.

use serde::{Deserialize, Serialize};

use crate::{
    errors::{EncodeError, ParseError},
    types::{ChatMessage, CorrelationId, Identity, Participant},
};

/// Events the client sends to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// Announce the local identity (`new-user`).
    Join(Identity),
    /// Ask for a fresh roster snapshot (`get-users`).
    RequestRoster,
    /// Publish a chat message (`send`).
    SendMessage(ChatMessage),
    /// Announce departure (`exit`).
    Leave(Identity),
}

/// Wire representation, tagged by `type`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Command {
    NewUser {
        user: Identity,
    },
    GetUsers,
    Send {
        message: String,
        user: Participant,
        #[serde(rename = "tempId", default, skip_serializing_if = "Option::is_none")]
        temp_id: Option<CorrelationId>,
    },
    Exit {
        user: Identity,
    },
}

impl OutboundEvent {
    /// Wire `type` of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join(_) => "new-user",
            Self::RequestRoster => "get-users",
            Self::SendMessage(_) => "send",
            Self::Leave(_) => "exit",
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let command = match self {
            Self::Join(identity) => Command::NewUser { user: identity.clone() },
            Self::RequestRoster => Command::GetUsers,
            Self::SendMessage(message) => Command::Send {
                message: message.text.clone(),
                user: message.author.clone(),
                temp_id: message.correlation_id.clone(),
            },
            Self::Leave(identity) => Command::Exit { user: identity.clone() },
        };

        serde_json::to_string(&command)
            .map_err(|e| EncodeError { kind: self.kind(), reason: e.to_string() })
    }

    /// Decode a frame sent by a client.
    ///
    /// This is the relay's view of the protocol. Sessions never call it; the
    /// simulated relay and protocol tests do.
    pub fn decode(raw: &str) -> Result<Self, ParseError> {
        let command: Command = serde_json::from_str(raw).map_err(|e| {
            if e.is_syntax() || e.is_eof() {
                ParseError::Syntax(e.to_string())
            } else {
                ParseError::malformed("client command", &e)
            }
        })?;

        Ok(match command {
            Command::NewUser { user } => Self::Join(user),
            Command::GetUsers => Self::RequestRoster,
            Command::Send { message, user, temp_id } => Self::SendMessage(ChatMessage {
                text: message,
                author: user,
                correlation_id: temp_id,
            }),
            Command::Exit { user } => Self::Leave(user),
        })
    }
}
