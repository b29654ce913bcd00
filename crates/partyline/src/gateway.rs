//! Connection gateway: identity assignment, inbound routing, and cleanup.
//!
//! Every inbound frame goes through [`ServerState::dispatch`], which turns
//! it into a [`ClientMessage`] and forwards it to the room registry. Errors
//! never escape: they become an `error` reply or a log line.

use partyline_protocol::{ClientId, ClientMessage, Codec, ServerMessage};
use partyline_room::ClientSender;
use partyline_transport::TransportError;
use rand::Rng;
use serde_json::Value;

use crate::PartylineError;
use crate::server::ServerState;

impl<C: Codec> ServerState<C> {
    /// Registers a new connection and greets it with `welcome`.
    ///
    /// The returned identity is unique among live connections.
    pub(crate) async fn accept(&self, sender: ClientSender) -> ClientId {
        let mut connections = self.connections.lock().await;
        let client_id = loop {
            let candidate = generate_client_id();
            if !connections.contains_key(&candidate) {
                break candidate;
            }
        };

        let welcome = ServerMessage::Welcome {
            client_id: client_id.clone(),
        };
        if sender.send(welcome).is_err() {
            tracing::debug!(%client_id, "welcome dropped, client queue closed");
        }
        connections.insert(client_id.clone(), sender);
        tracing::info!(%client_id, connections = connections.len(), "client connected");
        client_id
    }

    /// Handles one inbound frame from `client_id`.
    pub(crate) async fn dispatch(&self, client_id: &ClientId, data: &[u8]) {
        let Err(e) = self.route(client_id, data).await else {
            return;
        };
        match e.client_reply() {
            Some(text) => {
                tracing::debug!(%client_id, error = %e, "request rejected");
                self.send(client_id, ServerMessage::error(text)).await;
            }
            None => {
                tracing::debug!(%client_id, error = %e, "request failed silently");
            }
        }
    }

    async fn route(&self, client_id: &ClientId, data: &[u8]) -> Result<(), PartylineError> {
        let value: Value = self.codec.decode(data)?;
        let msg = ClientMessage::from_value(value)?;
        tracing::debug!(%client_id, kind = msg.kind(), "message received");

        match msg {
            ClientMessage::CreateRoom { name } => {
                let sender = self.sender_of(client_id).await?;
                self.rooms
                    .create_room(client_id.clone(), name, sender)
                    .await?;
            }
            ClientMessage::JoinRoom {
                code,
                name,
                was_host,
            } => {
                let sender = self.sender_of(client_id).await?;
                self.rooms
                    .join_room(client_id.clone(), &code, name, was_host, sender)
                    .await?;
            }
            ClientMessage::Relay(payload) => {
                self.rooms.relay(client_id, payload).await?;
            }
            ClientMessage::SetSettings(patch) => {
                self.rooms.set_settings(client_id, &patch).await?;
            }
            ClientMessage::LeaveRoom => {
                self.rooms.leave(client_id).await?;
            }
        }
        Ok(())
    }

    /// Forgets a connection and removes it from its room.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub(crate) async fn on_disconnect(&self, client_id: &ClientId) {
        let removed = self.connections.lock().await.remove(client_id);
        if removed.is_none() {
            return;
        }

        match self.rooms.leave(client_id).await {
            Ok(Some(room_code)) => {
                tracing::info!(%client_id, %room_code, "client disconnected, left room");
            }
            Ok(None) => tracing::info!(%client_id, "client disconnected"),
            Err(e) => tracing::warn!(%client_id, error = %e, "leave on disconnect failed"),
        }
    }

    /// Queues `message` for `client_id`. Failures are logged and dropped.
    pub(crate) async fn send(&self, client_id: &ClientId, message: ServerMessage) {
        let connections = self.connections.lock().await;
        let delivered = connections
            .get(client_id)
            .is_some_and(|sender| sender.send(message).is_ok());
        if !delivered {
            tracing::debug!(%client_id, "send to departed client dropped");
        }
    }

    async fn sender_of(&self, client_id: &ClientId) -> Result<ClientSender, PartylineError> {
        self.connections
            .lock()
            .await
            .get(client_id)
            .cloned()
            .ok_or_else(|| TransportError::ConnectionClosed(client_id.to_string()).into())
    }
}

/// 64 random bits, hex-encoded.
fn generate_client_id() -> ClientId {
    let bytes: [u8; 8] = rand::rng().random();
    ClientId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}
