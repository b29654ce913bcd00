//! Unified error type for the Partyline server.

use partyline_protocol::{ProtocolError, ROOM_NOT_FOUND};
use partyline_room::RoomError;
use partyline_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift transport, protocol, and room
/// errors into this one type inside the gateway.
#[derive(Debug, thiserror::Error)]
pub enum PartylineError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (bad JSON, unknown type, bad payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, not host, ...).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The environment held an unusable setting.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PartylineError {
    /// The `error.message` sent back to the client whose message caused
    /// this error, or `None` if the client is told nothing.
    pub fn client_reply(&self) -> Option<&'static str> {
        match self {
            Self::Protocol(e) => e.reply_text(),
            Self::Room(RoomError::NotFound(_) | RoomError::Unavailable(_)) => Some(ROOM_NOT_FOUND),
            Self::Room(RoomError::CodesExhausted) => Some("No rooms available."),
            Self::Room(RoomError::NotHost(..) | RoomError::NotInRoom(..)) => None,
            Self::Transport(_) | Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use partyline_protocol::{ClientId, RoomCode};

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: PartylineError = TransportError::ConnectionClosed("gone".into()).into();
        assert!(matches!(err, PartylineError::Transport(_)));
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.client_reply(), None);
    }

    #[test]
    fn test_client_reply_for_protocol_errors() {
        let err: PartylineError = ProtocolError::UnknownType("nope".into()).into();
        assert_eq!(err.client_reply(), Some("Unknown type"));

        let decode = serde_json::from_slice::<serde_json::Value>(b"{")
            .map_err(ProtocolError::Decode)
            .unwrap_err();
        let err: PartylineError = decode.into();
        assert_eq!(err.client_reply(), Some("Invalid JSON"));
    }

    #[test]
    fn test_client_reply_for_room_errors() {
        let code = RoomCode::normalize("QVK");
        let err: PartylineError = RoomError::NotFound(code.clone()).into();
        assert_eq!(err.client_reply(), Some("Room not found."));

        let err: PartylineError = RoomError::Unavailable(code.clone()).into();
        assert_eq!(err.client_reply(), Some("Room not found."));

        let err: PartylineError = RoomError::NotHost(ClientId::new("b"), code).into();
        assert_eq!(err.client_reply(), None);
    }
}
