//! Room lifecycle management for Partyline.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! members, host pointer, settings, and deletion timer.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms, looks up codes, routes clients
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomState`]: Active / Draining / Deleted state machine
//! - [`RoomConfig`]: grace period, default settings, channel size

mod code;
mod config;
mod error;
mod registry;
mod room;

pub use config::{RoomConfig, RoomState};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{ClientSender, JoinOutcome, RoomHandle, RoomInfo};
