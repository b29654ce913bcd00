//! Wire protocol for Partyline.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`ClientId`],
//!   [`RoomCode`], [`Settings`], [`PlayerInfo`]): the messages and values
//!   that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while parsing.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Room (membership)
//! ```
//!
//! The protocol layer knows nothing about connections or rooms. Relay
//! payloads stay as untyped JSON objects so new games never need a server
//! change.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientId, ClientMessage, DEFAULT_HOST_NAME, DEFAULT_PLAYER_NAME, INVALID_JSON, PlayerInfo,
    ROOM_NOT_FOUND, RoomCode, ServerMessage, Settings, SettingsPatch, UNKNOWN_TYPE,
};

/// Untyped JSON object carried by `relay` messages.
pub type RelayPayload = serde_json::Map<String, serde_json::Value>;
