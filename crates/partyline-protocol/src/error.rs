//! Error types for the protocol layer.
//!
//! Each crate in Partyline defines its own error enum. A `ProtocolError`
//! always means the problem is in turning bytes into messages (or back),
//! never in networking or room management.

use crate::types::{INVALID_JSON, UNKNOWN_TYPE};

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization of an outbound message failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The inbound bytes are not valid JSON.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope's `type` is not one the server understands.
    ///
    /// Holds the received tag; empty when the envelope had no string `type`.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// The `type` is known but its `payload` has the wrong shape.
    #[error("invalid payload for {kind}: {reason}")]
    InvalidPayload {
        /// The envelope `type` whose payload was rejected.
        kind: String,
        /// Human-readable description of what was wrong.
        reason: String,
    },
}

impl ProtocolError {
    /// The `error.message` text reported back to the originating client.
    ///
    /// Returns `None` for failures that are the server's own fault and
    /// have nothing useful to tell the client.
    pub fn reply_text(&self) -> Option<&'static str> {
        match self {
            Self::Encode(_) => None,
            Self::Decode(_) | Self::InvalidPayload { .. } => Some(INVALID_JSON),
            Self::UnknownType(_) => Some(UNKNOWN_TYPE),
        }
    }
}
