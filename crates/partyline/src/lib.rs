//! # Partyline
//!
//! Room-based WebSocket relay server for browser party games.
//!
//! Clients connect, create or join a room by a short code, and exchange
//! opaque `relay` events with everyone else in the room. The server owns
//! membership, host authority (with failover), per-room settings, and a
//! grace period that keeps an empty room alive so its host can come back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use partyline::prelude::*;
//!
//! # async fn start() -> Result<(), PartylineError> {
//! let server = PartylineServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod gateway;
mod handler;
mod server;

pub use config::{DEFAULT_HOST, DEFAULT_PORT, ServerConfig};
pub use error::PartylineError;
pub use server::{PartylineServer, PartylineServerBuilder};

/// Everything needed to run a server or talk to its room registry.
pub mod prelude {
    pub use crate::{PartylineError, PartylineServer, PartylineServerBuilder, ServerConfig};
    pub use partyline_protocol::{
        ClientId, ClientMessage, Codec, JsonCodec, PlayerInfo, ProtocolError, RelayPayload,
        RoomCode, ServerMessage, Settings, SettingsPatch,
    };
    pub use partyline_room::{RoomConfig, RoomError, RoomInfo, RoomRegistry, RoomState};
    pub use partyline_transport::TransportError;
}
