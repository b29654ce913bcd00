//! Core protocol types for Partyline's wire format.
//!
//! Every frame in either direction is a JSON envelope `{type, payload}`.
//! Inbound envelopes are parsed by hand ([`ClientMessage::from_value`]) so
//! the gateway can tell "not JSON" apart from "unknown type" and "bad
//! payload"; outbound envelopes are plain serde ([`ServerMessage`]).

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

/// Reply text for input that could not be parsed.
pub const INVALID_JSON: &str = "Invalid JSON";

/// Reply text for an envelope whose `type` is not recognized.
pub const UNKNOWN_TYPE: &str = "Unknown type";

/// Reply text for a join to a code with no active room.
pub const ROOM_NOT_FOUND: &str = "Room not found.";

/// Display name given to a room creator that didn't send one.
pub const DEFAULT_HOST_NAME: &str = "Host";

/// Display name given to a joiner that didn't send one.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Ephemeral identity of one live connection.
///
/// Assigned by the gateway on connect and announced in `welcome`. It is
/// never reused while the connection lives and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps an already-generated identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short code that players type to find a room, e.g. `QVK`.
///
/// Codes are matched case-insensitively: every constructor upper-cases its
/// input, so `qvk` and `QVK` name the same room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Symbols a generated code is drawn from. `I` and `O` are left out
    /// because they read like `1` and `0`.
    pub const ALPHABET: &'static [u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";

    /// Number of symbols in a generated code.
    pub const LEN: usize = 3;

    /// Number of distinct codes that can be generated (24³).
    pub const CODESPACE: usize = 24 * 24 * 24;

    /// Normalizes user input into a code. Input is not validated; a
    /// malformed code simply never matches a room.
    pub fn normalize(input: &str) -> Self {
        Self(input.to_uppercase())
    }

    /// Builds a code from three indices into [`Self::ALPHABET`].
    ///
    /// Indices are reduced modulo the alphabet size.
    pub fn from_indices(indices: [usize; Self::LEN]) -> Self {
        let code = indices
            .iter()
            .map(|i| Self::ALPHABET[i % Self::ALPHABET.len()] as char)
            .collect();
        Self(code)
    }

    /// Returns `true` if this code could have been generated by the server.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::LEN
            && self.0.bytes().all(|b| Self::ALPHABET.contains(&b))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room data
// ---------------------------------------------------------------------------

/// Per-room game selection, broadcast in full whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Which game the room is playing.
    pub game_id: String,
    /// Visual/tone theme of the game.
    pub theme: String,
}

impl Settings {
    /// Creates a settings object.
    pub fn new(game_id: impl Into<String>, theme: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            theme: theme.into(),
        }
    }

    /// Merges the provided fields. Missing and empty fields leave the
    /// current value untouched.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(game_id) = patch.game_id.as_deref().filter(|s| !s.is_empty()) {
            self.game_id = game_id.to_owned();
        }
        if let Some(theme) = patch.theme.as_deref().filter(|s| !s.is_empty()) {
            self.theme = theme.to_owned();
        }
    }
}

/// A partial settings update sent by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    /// New game, if changing.
    pub game_id: Option<String>,
    /// New theme, if changing.
    pub theme: Option<String>,
}

/// One entry of a `players-update` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// The member's connection identity.
    pub id: ClientId,
    /// Display name chosen by the member.
    pub name: String,
    /// Whether this member is the room's current host.
    pub is_host: bool,
}

// ---------------------------------------------------------------------------
// ClientMessage: inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CreateRoomPayload {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct JoinRoomPayload {
    code: Option<String>,
    name: Option<String>,
    was_host: Option<bool>,
}

/// A parsed inbound message.
///
/// Defaults are already applied: missing names become
/// [`DEFAULT_HOST_NAME`] / [`DEFAULT_PLAYER_NAME`] and the join code is
/// normalized to upper case.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// `create-room {name}`
    CreateRoom {
        /// Creator's display name.
        name: String,
    },
    /// `join-room {code, name, wasHost?}`
    JoinRoom {
        /// Normalized room code.
        code: RoomCode,
        /// Joiner's display name.
        name: String,
        /// Client's claim that it hosted this room before disconnecting.
        was_host: bool,
    },
    /// `relay {channel, action, ...}`: opaque to the server.
    Relay(Map<String, Value>),
    /// `set-settings {gameId?, theme?}`
    SetSettings(SettingsPatch),
    /// `leave-room {}`
    LeaveRoom,
}

impl ClientMessage {
    /// Interprets a decoded JSON document as an inbound envelope.
    ///
    /// A missing or `null` payload is treated as `{}`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownType`] if `type` is missing, not a string,
    ///   or not one of the five known kinds.
    /// - [`ProtocolError::InvalidPayload`] if the payload has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut envelope) = value else {
            return Err(ProtocolError::UnknownType(String::new()));
        };
        let kind = match envelope.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::UnknownType(String::new())),
        };
        let payload = match envelope.remove("payload") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(payload) => payload,
        };

        match kind.as_str() {
            "create-room" => {
                let p: CreateRoomPayload = parse_payload(&kind, payload)?;
                Ok(Self::CreateRoom {
                    name: display_name(p.name, DEFAULT_HOST_NAME),
                })
            }
            "join-room" => {
                let p: JoinRoomPayload = parse_payload(&kind, payload)?;
                Ok(Self::JoinRoom {
                    code: RoomCode::normalize(p.code.as_deref().unwrap_or_default()),
                    name: display_name(p.name, DEFAULT_PLAYER_NAME),
                    was_host: p.was_host.unwrap_or(false),
                })
            }
            "relay" => match payload {
                Value::Object(fields) => Ok(Self::Relay(fields)),
                _ => Err(ProtocolError::InvalidPayload {
                    kind: kind.clone(),
                    reason: "relay payload must be an object".into(),
                }),
            },
            "set-settings" => Ok(Self::SetSettings(parse_payload(&kind, payload)?)),
            "leave-room" => Ok(Self::LeaveRoom),
            _ => Err(ProtocolError::UnknownType(kind.clone())),
        }
    }

    /// The envelope `type` this message was parsed from.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinRoom { .. } => "join-room",
            Self::Relay(_) => "relay",
            Self::SetSettings(_) => "set-settings",
            Self::LeaveRoom => "leave-room",
        }
    }
}

fn parse_payload<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_owned(),
        reason: e.to_string(),
    })
}

fn display_name(name: Option<String>, fallback: &str) -> String {
    name.filter(|n| !n.is_empty())
        .unwrap_or_else(|| fallback.to_owned())
}

// ---------------------------------------------------------------------------
// ServerMessage: outbound
// ---------------------------------------------------------------------------

/// Messages the server pushes to clients.
///
/// Serialized adjacently tagged, so `HostChanged` becomes
/// `{"type":"host-changed","payload":{"newHostId":..,"newHostName":..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once on connect with the identity assigned to the connection.
    #[serde(rename_all = "camelCase")]
    Welcome { client_id: ClientId },

    /// The recipient now hosts `room_code` (new room or restored host).
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: RoomCode,
        self_id: ClientId,
        settings: Settings,
    },

    /// The recipient joined `room_code` as an ordinary member.
    #[serde(rename_all = "camelCase")]
    JoinedRoom {
        room_code: RoomCode,
        self_id: ClientId,
        host_id: ClientId,
        settings: Settings,
    },

    /// Full member list in join order.
    PlayersUpdate { players: Vec<PlayerInfo> },

    /// Host authority moved after the previous host left.
    #[serde(rename_all = "camelCase")]
    HostChanged {
        new_host_id: ClientId,
        new_host_name: String,
    },

    /// Complete settings after a host change to them.
    SettingsUpdate(Settings),

    /// A relayed payload, with `from` set to the sender's identity.
    Relay(Map<String, Value>),

    /// A request from this client failed.
    Error { message: String },
}

impl ServerMessage {
    /// Builds an `error {message}` reply.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// The envelope `type` this message serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::RoomCreated { .. } => "room-created",
            Self::JoinedRoom { .. } => "joined-room",
            Self::PlayersUpdate { .. } => "players-update",
            Self::HostChanged { .. } => "host-changed",
            Self::SettingsUpdate(_) => "settings-update",
            Self::Relay(_) => "relay",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client reads these exact JSON shapes, so the tests pin
    //! field names and tags rather than round-tripping.

    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<ClientMessage, ProtocolError> {
        ClientMessage::from_value(value)
    }

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_client_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ClientId::new("9f2c")).unwrap();
        assert_eq!(json, "\"9f2c\"");
    }

    #[test]
    fn test_room_code_normalize_uppercases() {
        assert_eq!(RoomCode::normalize("qvk"), RoomCode::normalize("QVK"));
        assert_eq!(RoomCode::normalize("qVk").as_str(), "QVK");
    }

    #[test]
    fn test_room_code_from_indices_wraps_into_alphabet() {
        assert_eq!(RoomCode::from_indices([0, 1, 2]).as_str(), "ABC");
        assert_eq!(RoomCode::from_indices([23, 24, 25]).as_str(), "ZAB");
    }

    #[test]
    fn test_room_code_well_formed_rejects_ambiguous_letters() {
        assert!(RoomCode::normalize("qvk").is_well_formed());
        assert!(!RoomCode::normalize("QIK").is_well_formed());
        assert!(!RoomCode::normalize("QOK").is_well_formed());
        assert!(!RoomCode::normalize("QV").is_well_formed());
        assert!(!RoomCode::normalize("QVK1").is_well_formed());
    }

    #[test]
    fn test_alphabet_has_no_i_or_o() {
        assert_eq!(RoomCode::ALPHABET.len(), 24);
        assert!(!RoomCode::ALPHABET.contains(&b'I'));
        assert!(!RoomCode::ALPHABET.contains(&b'O'));
    }

    // =====================================================================
    // Settings
    // =====================================================================

    #[test]
    fn test_settings_apply_merges_only_present_fields() {
        let mut settings = Settings::new("truth", "party");
        settings.apply(&SettingsPatch {
            game_id: Some("vote".into()),
            theme: None,
        });
        assert_eq!(settings, Settings::new("vote", "party"));
    }

    #[test]
    fn test_settings_apply_ignores_empty_strings() {
        let mut settings = Settings::new("truth", "party");
        settings.apply(&SettingsPatch {
            game_id: Some(String::new()),
            theme: Some("spooky".into()),
        });
        assert_eq!(settings, Settings::new("truth", "spooky"));
    }

    #[test]
    fn test_settings_json_is_camel_case() {
        let json = serde_json::to_value(Settings::new("truth", "party")).unwrap();
        assert_eq!(json, json!({"gameId": "truth", "theme": "party"}));
    }

    // =====================================================================
    // ClientMessage parsing
    // =====================================================================

    #[test]
    fn test_parse_create_room() {
        let msg = parse(json!({"type": "create-room", "payload": {"name": "Ana"}})).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom { name: "Ana".into() });
    }

    #[test]
    fn test_parse_create_room_defaults_name() {
        let msg = parse(json!({"type": "create-room"})).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom { name: "Host".into() });

        let msg = parse(json!({"type": "create-room", "payload": {"name": ""}})).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom { name: "Host".into() });
    }

    #[test]
    fn test_parse_join_room_normalizes_code() {
        let msg = parse(json!({
            "type": "join-room",
            "payload": {"code": "qvk", "name": "Bo", "wasHost": true}
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                code: RoomCode::normalize("QVK"),
                name: "Bo".into(),
                was_host: true,
            }
        );
    }

    #[test]
    fn test_parse_join_room_defaults() {
        let msg = parse(json!({"type": "join-room", "payload": {"code": "abc"}})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                code: RoomCode::normalize("ABC"),
                name: "Player".into(),
                was_host: false,
            }
        );
    }

    #[test]
    fn test_parse_relay_keeps_payload_opaque() {
        let msg = parse(json!({
            "type": "relay",
            "payload": {"channel": "truth", "action": "spin", "nested": {"a": [1, 2]}}
        }))
        .unwrap();
        let ClientMessage::Relay(fields) = msg else {
            panic!("expected relay");
        };
        assert_eq!(fields["channel"], "truth");
        assert_eq!(fields["nested"]["a"], json!([1, 2]));
    }

    #[test]
    fn test_parse_relay_rejects_non_object_payload() {
        let err = parse(json!({"type": "relay", "payload": [1, 2, 3]})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref kind, .. } if kind == "relay"));
    }

    #[test]
    fn test_parse_set_settings_partial() {
        let msg = parse(json!({"type": "set-settings", "payload": {"theme": "neon"}})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetSettings(SettingsPatch {
                game_id: None,
                theme: Some("neon".into()),
            })
        );
    }

    #[test]
    fn test_parse_leave_room_ignores_payload() {
        let msg = parse(json!({"type": "leave-room", "payload": {"why": "bored"}})).unwrap();
        assert_eq!(msg, ClientMessage::LeaveRoom);
        assert_eq!(msg.kind(), "leave-room");
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = parse(json!({"type": "fly-to-moon", "payload": {}})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(ref t) if t == "fly-to-moon"));
    }

    #[test]
    fn test_parse_missing_or_non_string_type_is_unknown() {
        assert!(matches!(
            parse(json!({"payload": {}})),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(
            parse(json!({"type": 7})),
            Err(ProtocolError::UnknownType(_))
        ));
        assert!(matches!(parse(json!(42)), Err(ProtocolError::UnknownType(_))));
    }

    #[test]
    fn test_parse_wrongly_typed_field_is_invalid_payload() {
        let err = parse(json!({"type": "create-room", "payload": {"name": 5}})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    // =====================================================================
    // ServerMessage JSON shapes
    // =====================================================================

    #[test]
    fn test_welcome_json_format() {
        let json = serde_json::to_value(ServerMessage::Welcome {
            client_id: ClientId::new("abc123"),
        })
        .unwrap();
        assert_eq!(json, json!({"type": "welcome", "payload": {"clientId": "abc123"}}));
    }

    #[test]
    fn test_joined_room_json_format() {
        let msg = ServerMessage::JoinedRoom {
            room_code: RoomCode::normalize("QVK"),
            self_id: ClientId::new("b"),
            host_id: ClientId::new("a"),
            settings: Settings::new("truth", "party"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "joined-room",
                "payload": {
                    "roomCode": "QVK",
                    "selfId": "b",
                    "hostId": "a",
                    "settings": {"gameId": "truth", "theme": "party"}
                }
            })
        );
        assert_eq!(msg.kind(), "joined-room");
    }

    #[test]
    fn test_players_update_json_format() {
        let json = serde_json::to_value(ServerMessage::PlayersUpdate {
            players: vec![PlayerInfo {
                id: ClientId::new("a"),
                name: "Ana".into(),
                is_host: true,
            }],
        })
        .unwrap();
        assert_eq!(json["type"], "players-update");
        assert_eq!(
            json["payload"]["players"],
            json!([{"id": "a", "name": "Ana", "isHost": true}])
        );
    }

    #[test]
    fn test_host_changed_json_format() {
        let json = serde_json::to_value(ServerMessage::HostChanged {
            new_host_id: ClientId::new("b"),
            new_host_name: "Bo".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"type": "host-changed", "payload": {"newHostId": "b", "newHostName": "Bo"}})
        );
    }

    #[test]
    fn test_settings_update_payload_is_settings_object() {
        let json =
            serde_json::to_value(ServerMessage::SettingsUpdate(Settings::new("vote", "neon")))
                .unwrap();
        assert_eq!(
            json,
            json!({"type": "settings-update", "payload": {"gameId": "vote", "theme": "neon"}})
        );
    }

    #[test]
    fn test_error_json_format() {
        let json = serde_json::to_value(ServerMessage::error(ROOM_NOT_FOUND)).unwrap();
        assert_eq!(json, json!({"type": "error", "payload": {"message": "Room not found."}}));
    }

    #[test]
    fn test_server_message_decodes_back() {
        // Test clients decode what the server sends.
        let mut fields = Map::new();
        fields.insert("from".into(), json!("a"));
        fields.insert("action".into(), json!("spin"));
        let msg = ServerMessage::Relay(fields);
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }
}
