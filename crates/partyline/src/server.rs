//! `PartylineServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → rooms.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use partyline_protocol::{ClientId, Codec, JsonCodec};
use partyline_room::{ClientSender, RoomConfig, RoomRegistry};
use partyline_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::{PartylineError, ServerConfig};

/// State shared by every connection task.
///
/// Created once per server and handed to each task behind an `Arc`.
pub(crate) struct ServerState<C: Codec> {
    /// Outbound queue of every live connection, keyed by its identity.
    pub(crate) connections: Mutex<HashMap<ClientId, ClientSender>>,
    pub(crate) rooms: RoomRegistry,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

impl<C: Codec> ServerState<C> {
    pub(crate) fn new(config: ServerConfig, codec: C) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            rooms: RoomRegistry::new(config.room.clone()),
            codec,
            config,
        }
    }
}

/// Builder for configuring and starting a Partyline server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use partyline::prelude::*;
///
/// # async fn start() -> Result<(), PartylineError> {
/// let server = PartylineServer::builder()
///     .bind("127.0.0.1:3000")
///     .grace_period(Duration::from_secs(30))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PartylineServerBuilder {
    config: ServerConfig,
}

impl PartylineServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration rooms are created with.
    pub fn room_config(mut self, room: RoomConfig) -> Self {
        self.config.room = room;
        self
    }

    /// Sets how long an empty room waits before it is deleted.
    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.room.grace_period = grace;
        self
    }

    /// Closes connections that send nothing for `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = Some(timeout);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<PartylineServer<JsonCodec>, PartylineError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState::new(self.config, JsonCodec));
        Ok(PartylineServer { transport, state })
    }
}

impl Default for PartylineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Partyline server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PartylineServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl PartylineServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PartylineServerBuilder {
        PartylineServerBuilder::new()
    }
}

impl<C: Codec> PartylineServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, PartylineError> {
        Ok(self.transport.local_addr()?)
    }

    /// The server's room registry.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.state.rooms
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the process is terminated, spawning a
    /// handler task per connection.
    pub async fn run(mut self) -> Result<(), PartylineError> {
        tracing::info!(
            addr = %self.config().bind_addr,
            grace_secs = self.config().room.grace_period.as_secs_f64(),
            "partyline server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
