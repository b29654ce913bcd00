//! Error types for the room layer.

use partyline_protocol::{ClientId, RoomCode};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No active room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The client is not a member of this room.
    #[error("client {0} not in room {1}")]
    NotInRoom(ClientId, RoomCode),

    /// Only the current host may do this.
    #[error("client {0} is not the host of room {1}")]
    NotHost(ClientId, RoomCode),

    /// The room actor stopped (deleted or shut down) before answering.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// Every possible room code is in use.
    #[error("no free room codes")]
    CodesExhausted,
}
