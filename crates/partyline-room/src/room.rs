//! Room actor: one Tokio task per room code.
//!
//! The actor owns everything that belongs to a room (members in join
//! order, host pointer, settings, deletion deadline) and is the only code
//! that touches it. Everyone else talks to it through a [`RoomHandle`].

use std::sync::Weak;
use std::time::SystemTime;

use partyline_protocol::{
    ClientId, PlayerInfo, RelayPayload, RoomCode, ServerMessage, Settings, SettingsPatch,
};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;

use crate::registry::Directory;
use crate::{RoomConfig, RoomError, RoomState};

/// Channel that feeds one client's writer task.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// What a successful join turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The joiner is now the host (and was sent `room-created`).
    pub is_host: bool,
    /// The joiner was already a member; only its name was updated.
    pub rejoined: bool,
}

/// A snapshot of a room, taken by the actor on request.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// The room's code.
    pub code: RoomCode,
    /// Current lifecycle state.
    pub state: RoomState,
    /// When the room was created.
    pub created_at: SystemTime,
    /// Current host, `None` while draining.
    pub host: Option<ClientId>,
    /// Members in join order.
    pub players: Vec<PlayerInfo>,
    /// Current settings.
    pub settings: Settings,
    /// Whether the deletion timer is running.
    pub deletion_pending: bool,
}

/// Commands sent to a room actor through its channel.
///
/// Variants carrying a `oneshot::Sender` expect an answer; the rest are
/// fire-and-forget.
pub(crate) enum RoomCommand {
    Join {
        client_id: ClientId,
        name: String,
        was_host: bool,
        sender: ClientSender,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },
    Leave {
        client_id: ClientId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Relay {
        sender: ClientId,
        payload: RelayPayload,
    },
    SetSettings {
        client_id: ClientId,
        patch: SettingsPatch,
        reply: oneshot::Sender<Result<Settings, RoomError>>,
    },
    Broadcast {
        message: ServerMessage,
        except: Option<ClientId>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
    Shutdown,
}

/// Handle to a running room actor.
///
/// Cheap to clone. The registry keeps one per code; `instance` tells apart
/// two rooms that reused the same code over time.
#[derive(Clone)]
pub struct RoomHandle {
    instance: u64,
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    /// Returns `true` once the actor task has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    pub(crate) async fn join(
        &self,
        client_id: ClientId,
        name: String,
        was_host: bool,
        sender: ClientSender,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                client_id,
                name,
                was_host,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub(crate) async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                client_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub(crate) async fn relay(
        &self,
        sender: ClientId,
        payload: RelayPayload,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Relay { sender, payload })
            .await
            .map_err(|_| self.unavailable())
    }

    pub(crate) async fn set_settings(
        &self,
        client_id: ClientId,
        patch: SettingsPatch,
    ) -> Result<Settings, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::SetSettings {
                client_id,
                patch,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Delivers `message` to every member except `except`.
    pub async fn broadcast(
        &self,
        message: ServerMessage,
        except: Option<ClientId>,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Broadcast { message, except })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests a snapshot of the room.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    pub(crate) async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

struct Member {
    id: ClientId,
    name: String,
    is_host: bool,
    sender: ClientSender,
}

struct RoomActor {
    instance: u64,
    code: RoomCode,
    state: RoomState,
    config: RoomConfig,
    created_at: SystemTime,
    /// Join order is the failover order.
    members: Vec<Member>,
    host: Option<ClientId>,
    settings: Settings,
    delete_at: Option<Instant>,
    directory: Weak<Mutex<Directory>>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::debug!(room_code = %self.code, instance = self.instance, "room actor started");

        loop {
            let deadline = self.delete_at;
            tokio::select! {
                biased;

                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Shutdown) | None => {
                        self.transition(RoomState::Deleted);
                        tracing::info!(room_code = %self.code, "room closed");
                        break;
                    }
                    Some(cmd) => self.handle(cmd),
                },

                () = sleep_until_deadline(deadline) => {
                    if self.expire().await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(room_code = %self.code, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                client_id,
                name,
                was_host,
                sender,
                reply,
            } => {
                let result = self.handle_join(client_id, name, was_host, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { client_id, reply } => {
                let result = self.handle_leave(&client_id);
                let _ = reply.send(result);
            }
            RoomCommand::Relay { sender, payload } => self.handle_relay(sender, payload),
            RoomCommand::SetSettings {
                client_id,
                patch,
                reply,
            } => {
                let result = self.handle_set_settings(&client_id, &patch);
                let _ = reply.send(result);
            }
            RoomCommand::Broadcast { message, except } => {
                self.broadcast(&message, except.as_ref());
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {}
        }
    }

    /// Handles the deletion deadline. Returns `true` if the room is gone.
    async fn expire(&mut self) -> bool {
        self.delete_at = None;
        if !self.members.is_empty() {
            return false;
        }

        if let Some(directory) = self.directory.upgrade() {
            let mut directory = directory.lock().await;
            if directory
                .rooms
                .get(&self.code)
                .is_some_and(|h| h.instance() == self.instance)
            {
                directory.rooms.remove(&self.code);
            }
        }

        self.transition(RoomState::Deleted);
        tracing::info!(room_code = %self.code, "room deleted after grace period");
        true
    }

    fn handle_join(
        &mut self,
        client_id: ClientId,
        name: String,
        was_host: bool,
        sender: ClientSender,
    ) -> Result<JoinOutcome, RoomError> {
        if !self.state.is_joinable() {
            return Err(RoomError::Unavailable(self.code.clone()));
        }

        let was_empty = self.members.is_empty();
        if was_empty {
            // An empty room always goes to its first joiner.
            self.delete_at = None;
            self.host = Some(client_id.clone());
            self.transition(RoomState::Active);
            if was_host {
                tracing::info!(room_code = %self.code, %client_id, "host restored");
            } else {
                tracing::info!(room_code = %self.code, %client_id, "empty room claimed");
            }
        } else if was_host {
            tracing::debug!(
                room_code = %self.code,
                %client_id,
                "host claim ignored, room is occupied"
            );
        }

        let rejoined = match self.members.iter_mut().find(|m| m.id == client_id) {
            Some(member) => {
                member.name = name;
                member.sender = sender;
                true
            }
            None => {
                self.members.push(Member {
                    id: client_id.clone(),
                    name,
                    is_host: false,
                    sender,
                });
                false
            }
        };
        self.sync_host_flags();

        tracing::info!(
            room_code = %self.code,
            %client_id,
            rejoined,
            players = self.members.len(),
            "player joined"
        );

        if was_empty {
            self.send_to(
                &client_id,
                ServerMessage::RoomCreated {
                    room_code: self.code.clone(),
                    self_id: client_id.clone(),
                    settings: self.settings.clone(),
                },
            );
        } else if let Some(host_id) = self.host.clone() {
            self.send_to(
                &client_id,
                ServerMessage::JoinedRoom {
                    room_code: self.code.clone(),
                    self_id: client_id.clone(),
                    host_id,
                    settings: self.settings.clone(),
                },
            );
        }
        self.publish_players();

        Ok(JoinOutcome {
            is_host: was_empty,
            rejoined,
        })
    }

    fn handle_leave(&mut self, client_id: &ClientId) -> Result<(), RoomError> {
        let Some(index) = self.members.iter().position(|m| &m.id == client_id) else {
            return Err(RoomError::NotInRoom(client_id.clone(), self.code.clone()));
        };
        let departed = self.members.remove(index);

        tracing::info!(
            room_code = %self.code,
            %client_id,
            players = self.members.len(),
            "player left"
        );

        if self.members.is_empty() {
            self.host = None;
            // A grace period past the clock's range never expires.
            self.delete_at = Instant::now().checked_add(self.config.grace_period);
            self.transition(RoomState::Draining);
            tracing::info!(
                room_code = %self.code,
                grace_secs = self.config.grace_period.as_secs_f64(),
                "room empty, deletion scheduled"
            );
            return Ok(());
        }

        if departed.is_host || self.host.as_ref() == Some(client_id) {
            let successor = &self.members[0];
            let (new_host_id, new_host_name) = (successor.id.clone(), successor.name.clone());
            self.host = Some(new_host_id.clone());
            self.sync_host_flags();
            tracing::info!(room_code = %self.code, %new_host_id, "host changed");
            self.broadcast(
                &ServerMessage::HostChanged {
                    new_host_id,
                    new_host_name,
                },
                None,
            );
        }
        self.publish_players();

        Ok(())
    }

    fn handle_relay(&mut self, sender: ClientId, mut payload: RelayPayload) {
        if !self.is_member(&sender) {
            tracing::warn!(
                room_code = %self.code,
                %sender,
                "relay from non-member, ignoring"
            );
            return;
        }

        let channel = payload.get("channel").and_then(Value::as_str).unwrap_or_default();
        let action = payload.get("action").and_then(Value::as_str).unwrap_or_default();
        tracing::debug!(room_code = %self.code, %sender, channel, action, "relay");
        payload.insert("from".into(), Value::String(sender.as_str().to_owned()));
        self.broadcast(&ServerMessage::Relay(payload), None);
    }

    fn handle_set_settings(
        &mut self,
        client_id: &ClientId,
        patch: &SettingsPatch,
    ) -> Result<Settings, RoomError> {
        if self.host.as_ref() != Some(client_id) {
            return Err(RoomError::NotHost(client_id.clone(), self.code.clone()));
        }

        self.settings.apply(patch);
        tracing::info!(
            room_code = %self.code,
            game_id = %self.settings.game_id,
            theme = %self.settings.theme,
            "settings updated"
        );
        self.broadcast(&ServerMessage::SettingsUpdate(self.settings.clone()), None);
        Ok(self.settings.clone())
    }

    fn transition(&mut self, target: RoomState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(target) {
            tracing::warn!(
                room_code = %self.code,
                from = %self.state,
                to = %target,
                "unexpected room state transition"
            );
        }
        self.state = target;
    }

    fn is_member(&self, client_id: &ClientId) -> bool {
        self.members.iter().any(|m| &m.id == client_id)
    }

    fn sync_host_flags(&mut self) {
        for member in &mut self.members {
            member.is_host = self.host.as_ref() == Some(&member.id);
        }
    }

    fn players(&self) -> Vec<PlayerInfo> {
        self.members
            .iter()
            .map(|m| PlayerInfo {
                id: m.id.clone(),
                name: m.name.clone(),
                is_host: m.is_host,
            })
            .collect()
    }

    fn publish_players(&self) {
        self.broadcast(
            &ServerMessage::PlayersUpdate {
                players: self.players(),
            },
            None,
        );
    }

    fn broadcast(&self, message: &ServerMessage, except: Option<&ClientId>) {
        for member in &self.members {
            if except != Some(&member.id) {
                self.deliver(member, message.clone());
            }
        }
    }

    fn send_to(&self, client_id: &ClientId, message: ServerMessage) {
        if let Some(member) = self.members.iter().find(|m| &m.id == client_id) {
            self.deliver(member, message);
        }
    }

    /// A closed queue means the client is going away; its leave follows.
    fn deliver(&self, member: &Member, message: ServerMessage) {
        let kind = message.kind();
        if member.sender.send(message).is_err() {
            tracing::debug!(
                room_code = %self.code,
                client_id = %member.id,
                kind,
                "delivery failed, client queue closed"
            );
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            state: self.state,
            created_at: self.created_at,
            host: self.host.clone(),
            players: self.players(),
            settings: self.settings.clone(),
            deletion_pending: self.delete_at.is_some(),
        }
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns a room with `host_id` as its only member and returns its handle.
///
/// The creator is sent `room-created` and the first `players-update`
/// before the task starts, so nothing can overtake them.
pub(crate) fn spawn_room(
    instance: u64,
    code: RoomCode,
    config: RoomConfig,
    host_id: ClientId,
    host_name: String,
    sender: ClientSender,
    directory: Weak<Mutex<Directory>>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = RoomActor {
        instance,
        code: code.clone(),
        state: RoomState::Active,
        settings: config.default_settings.clone(),
        config,
        created_at: SystemTime::now(),
        members: vec![Member {
            id: host_id.clone(),
            name: host_name,
            is_host: true,
            sender,
        }],
        host: Some(host_id.clone()),
        delete_at: None,
        directory,
        receiver: rx,
    };

    actor.send_to(
        &host_id,
        ServerMessage::RoomCreated {
            room_code: code.clone(),
            self_id: host_id.clone(),
            settings: actor.settings.clone(),
        },
    );
    actor.publish_players();

    tokio::spawn(actor.run());

    RoomHandle {
        instance,
        code,
        sender: tx,
    }
}
