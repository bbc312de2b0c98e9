//! Codec errors.

use thiserror::Error;

/// Failure to decode a frame received from the peer.
///
/// Decode errors are never fatal to a session: the offending frame is logged
/// and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The frame is not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(String),

    /// The frame is valid JSON but not an array or object.
    #[error("unexpected payload shape: {found}")]
    UnexpectedShape {
        /// JSON kind that was found instead
        found: &'static str,
    },

    /// A recognized event whose body does not match its schema.
    #[error("malformed {kind} payload: {reason}")]
    Malformed {
        /// Event kind being decoded
        kind: &'static str,
        /// Underlying deserialization failure
        reason: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(kind: &'static str, err: &serde_json::Error) -> Self {
        Self::Malformed { kind, reason: err.to_string() }
    }
}

/// Failure to encode an outbound event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to encode {kind}: {reason}")]
pub struct EncodeError {
    /// Wire type being encoded
    pub kind: &'static str,
    /// Underlying serialization failure
    pub reason: String,
}
