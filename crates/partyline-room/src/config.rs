//! Room configuration and state machine.

use std::time::Duration;

use partyline_protocol::Settings;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room of a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long an empty room keeps its code reserved before deletion.
    pub grace_period: Duration,

    /// Settings a freshly created room starts with.
    pub default_settings: Settings,

    /// Capacity of each room actor's command channel.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            default_settings: Settings::new("truth", "party"),
            command_buffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// ```text
///            last member leaves
///   Active ───────────────────────→ Draining ──(grace period)──→ Deleted
///     ↑                                │
///     └──────────── any join ──────────┘
/// ```
///
/// - **Active**: at least one member; the host pointer names one of them.
/// - **Draining**: no members, deletion timer running. The code stays
///   reserved so the previous host can come back.
/// - **Deleted**: removed from the registry. Terminal.
///
/// An administrative close may also take an `Active` room straight to
/// `Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomState {
    Active,
    Draining,
    Deleted,
}

impl RoomState {
    /// Returns `true` if the room still accepts joins.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Active | Self::Draining)
    }

    /// Returns `true` if transitioning to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Active, Self::Draining)
                | (Self::Draining, Self::Active)
                | (Self::Draining, Self::Deleted)
                | (Self::Active, Self::Deleted)
        )
    }
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Draining => write!(f, "Draining"),
            Self::Deleted => write!(f, "Deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_state_can_transition_to() {
        assert!(RoomState::Active.can_transition_to(RoomState::Draining));
        assert!(RoomState::Draining.can_transition_to(RoomState::Active));
        assert!(RoomState::Draining.can_transition_to(RoomState::Deleted));
        assert!(RoomState::Active.can_transition_to(RoomState::Deleted));

        assert!(!RoomState::Deleted.can_transition_to(RoomState::Active));
        assert!(!RoomState::Deleted.can_transition_to(RoomState::Draining));
        assert!(!RoomState::Active.can_transition_to(RoomState::Active));
    }

    #[test]
    fn test_room_state_is_joinable() {
        assert!(RoomState::Active.is_joinable());
        assert!(RoomState::Draining.is_joinable());
        assert!(!RoomState::Deleted.is_joinable());
    }

    #[test]
    fn test_room_state_display() {
        assert_eq!(RoomState::Draining.to_string(), "Draining");
    }

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.grace_period, Duration::from_secs(30));
        assert_eq!(config.default_settings, Settings::new("truth", "party"));
        assert_eq!(config.command_buffer, 64);
    }
}
