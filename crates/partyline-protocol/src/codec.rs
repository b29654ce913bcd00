//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust values and the bytes carried by a
//! transport frame. The gateway is generic over [`Codec`] so the wire
//! encoding can be swapped without touching routing or room code.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// This is what browser clients speak: every frame is one JSON document.
///
/// ```rust
/// use partyline_protocol::{ClientId, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let bytes = codec
///     .encode(&ServerMessage::Welcome { client_id: ClientId::new("ab12") })
///     .unwrap();
/// let value: serde_json::Value = codec.decode(&bytes).unwrap();
/// assert_eq!(value["type"], "welcome");
/// assert_eq!(value["payload"]["clientId"], "ab12");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
