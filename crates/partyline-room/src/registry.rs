//! Room registry: creates rooms, looks them up by code, and routes each
//! client to the one room it is in.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use partyline_protocol::{
    ClientId, RelayPayload, RoomCode, ServerMessage, Settings, SettingsPatch,
};
use tokio::sync::Mutex;

use crate::code::generate_unique_code;
use crate::room::spawn_room;
use crate::{ClientSender, JoinOutcome, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Tells apart successive rooms that reuse the same code.
static NEXT_ROOM_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// The two maps that must change together.
#[derive(Default)]
pub(crate) struct Directory {
    /// Live rooms, keyed by code.
    pub(crate) rooms: HashMap<RoomCode, RoomHandle>,
    /// Each client's current room. A client is in at most one room.
    pub(crate) client_rooms: HashMap<ClientId, RoomCode>,
}

/// Shared, cloneable entry point for every room operation.
///
/// The registry lock only guards the maps; it is always released before
/// waiting on a room actor, because an expiring actor takes the same lock
/// to remove itself.
#[derive(Clone)]
pub struct RoomRegistry {
    directory: Arc<Mutex<Directory>>,
    config: RoomConfig,
}

impl RoomRegistry {
    /// Creates an empty registry whose rooms use `config`.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            directory: Arc::new(Mutex::new(Directory::default())),
            config,
        }
    }

    /// Returns the configuration every room is spawned with.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `host_id` as its only member and host.
    ///
    /// A client already in a room leaves it first. The creator receives
    /// `room-created` followed by `players-update`.
    ///
    /// # Errors
    /// [`RoomError::CodesExhausted`] if every code is taken.
    pub async fn create_room(
        &self,
        host_id: ClientId,
        host_name: String,
        sender: ClientSender,
    ) -> Result<RoomCode, RoomError> {
        self.leave(&host_id).await?;

        let mut directory = self.directory.lock().await;
        if directory.rooms.len() >= RoomCode::CODESPACE {
            tracing::warn!(rooms = directory.rooms.len(), "room codes exhausted");
            return Err(RoomError::CodesExhausted);
        }

        let code = generate_unique_code(|c| directory.rooms.contains_key(c));
        let instance = NEXT_ROOM_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let handle = spawn_room(
            instance,
            code.clone(),
            self.config.clone(),
            host_id.clone(),
            host_name,
            sender,
            Arc::downgrade(&self.directory),
        );
        directory.rooms.insert(code.clone(), handle);
        directory.client_rooms.insert(host_id.clone(), code.clone());

        tracing::info!(room_code = %code, %host_id, rooms = directory.rooms.len(), "room created");
        Ok(code)
    }

    /// Finds a live room. `code` is matched case-insensitively.
    pub async fn lookup(&self, code: &str) -> Option<RoomHandle> {
        let code = RoomCode::normalize(code);
        self.directory.lock().await.rooms.get(&code).cloned()
    }

    /// Adds `client_id` to the room with `code`.
    ///
    /// A client in a different room leaves it first. Joining an empty room
    /// makes the joiner host; otherwise it joins as an ordinary member and
    /// `was_host` is ignored.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no room has that code, including a room
    /// that expired while the join was in flight.
    pub async fn join_room(
        &self,
        client_id: ClientId,
        code: &RoomCode,
        name: String,
        was_host: bool,
        sender: ClientSender,
    ) -> Result<JoinOutcome, RoomError> {
        let code = RoomCode::normalize(code.as_str());
        let handle = self
            .lookup(code.as_str())
            .await
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;

        if self.room_of(&client_id).await.is_some_and(|current| current != code) {
            self.leave(&client_id).await?;
        }

        let outcome = handle
            .join(client_id.clone(), name, was_host, sender)
            .await
            .map_err(|e| match e {
                RoomError::Unavailable(code) => RoomError::NotFound(code),
                other => other,
            })?;

        let mut directory = self.directory.lock().await;
        if directory
            .rooms
            .get(&code)
            .is_some_and(|h| h.instance() == handle.instance())
        {
            directory.client_rooms.insert(client_id, code);
        }
        Ok(outcome)
    }

    /// Removes `client_id` from its current room, if any.
    ///
    /// Returns the code of the room that was left. Calling this for a
    /// client in no room is a no-op.
    pub async fn leave(&self, client_id: &ClientId) -> Result<Option<RoomCode>, RoomError> {
        let (code, handle) = {
            let mut directory = self.directory.lock().await;
            let Some(code) = directory.client_rooms.remove(client_id) else {
                return Ok(None);
            };
            let handle = directory.rooms.get(&code).cloned();
            (code, handle)
        };

        let Some(handle) = handle else {
            return Ok(Some(code));
        };
        match handle.leave(client_id.clone()).await {
            Ok(()) => {}
            Err(RoomError::Unavailable(_)) => {
                tracing::debug!(room_code = %code, %client_id, "left a room that already closed");
            }
            Err(RoomError::NotInRoom(..)) => {
                tracing::warn!(room_code = %code, %client_id, "client index pointed at wrong room");
            }
            Err(e) => return Err(e),
        }
        Ok(Some(code))
    }

    /// Relays `payload` to every member of the sender's room, stamped with
    /// the sender's identity.
    ///
    /// Returns `Ok(None)` without doing anything if the sender is in no room.
    pub async fn relay(
        &self,
        client_id: &ClientId,
        payload: RelayPayload,
    ) -> Result<Option<RoomCode>, RoomError> {
        let Some(handle) = self.current_room(client_id).await else {
            tracing::debug!(%client_id, "relay from client in no room, dropped");
            return Ok(None);
        };
        handle.relay(client_id.clone(), payload).await?;
        Ok(Some(handle.code().clone()))
    }

    /// Applies a host's settings change and broadcasts the result.
    ///
    /// Returns `Ok(None)` if the client is in no room.
    ///
    /// # Errors
    /// [`RoomError::NotHost`] if the client is not its room's host.
    pub async fn set_settings(
        &self,
        client_id: &ClientId,
        patch: &SettingsPatch,
    ) -> Result<Option<Settings>, RoomError> {
        let Some(handle) = self.current_room(client_id).await else {
            return Ok(None);
        };
        handle
            .set_settings(client_id.clone(), patch.clone())
            .await
            .map(Some)
    }

    /// Delivers `message` to every member of `code` except `except`.
    pub async fn broadcast(
        &self,
        code: &RoomCode,
        message: ServerMessage,
        except: Option<ClientId>,
    ) -> Result<(), RoomError> {
        let handle = self
            .lookup(code.as_str())
            .await
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.broadcast(message, except).await
    }

    /// Closes a room immediately and forgets its members.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if no room has that code.
    pub async fn delete_room(&self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = {
            let mut directory = self.directory.lock().await;
            let handle = directory
                .rooms
                .remove(code)
                .ok_or_else(|| RoomError::NotFound(code.clone()))?;
            directory.client_rooms.retain(|_, room| room != code);
            handle
        };

        // An actor that is already gone needs no shutdown.
        let _ = handle.shutdown().await;
        tracing::info!(room_code = %code, "room deleted");
        Ok(())
    }

    /// Returns a snapshot of a room.
    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = self
            .lookup(code.as_str())
            .await
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.info().await.map_err(|e| match e {
            RoomError::Unavailable(code) => RoomError::NotFound(code),
            other => other,
        })
    }

    /// Returns the code of the room `client_id` is in.
    pub async fn room_of(&self, client_id: &ClientId) -> Option<RoomCode> {
        self.directory.lock().await.client_rooms.get(client_id).cloned()
    }

    /// Number of live rooms, draining ones included.
    pub async fn room_count(&self) -> usize {
        self.directory.lock().await.rooms.len()
    }

    /// Codes of all live rooms, sorted.
    pub async fn room_codes(&self) -> Vec<RoomCode> {
        let mut codes: Vec<_> = self.directory.lock().await.rooms.keys().cloned().collect();
        codes.sort();
        codes
    }

    async fn current_room(&self, client_id: &ClientId) -> Option<RoomHandle> {
        let directory = self.directory.lock().await;
        let code = directory.client_rooms.get(client_id)?;
        directory.rooms.get(code).cloned()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
