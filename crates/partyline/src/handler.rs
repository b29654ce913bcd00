//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]:
//!   1. Register with the gateway → `welcome`
//!   2. Spawn a writer task draining the client's outbound queue
//!   3. Loop: receive frames → dispatch
//!   4. On exit, run the disconnect cleanup, let the writer flush what is
//!      already queued, then close the socket

use std::sync::Arc;
use std::time::Duration;

use partyline_protocol::{ClientId, Codec, ServerMessage};
use partyline_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::PartylineError;
use crate::server::ServerState;

/// How long the writer may keep flushing after the read loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs the disconnect cleanup when the handler exits, even on panic.
///
/// `Drop` is synchronous, so the async cleanup is spawned.
struct ConnectionGuard<C: Codec> {
    client_id: ClientId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let client_id = self.client_id.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.on_disconnect(&client_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PartylineError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (tx, rx) = mpsc::unbounded_channel();
    let client_id = state.accept(tx).await;
    let _guard = ConnectionGuard {
        client_id: client_id.clone(),
        state: Arc::clone(&state),
    };

    let writer = spawn_writer(Arc::clone(&conn), Arc::clone(&state), client_id.clone(), rx);

    loop {
        let received = match state.config.idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%client_id, "connection idle, closing");
                    break;
                }
            },
            None => conn.recv().await,
        };

        match received {
            Ok(Some(data)) => state.dispatch(&client_id, &data).await,
            Ok(None) => {
                tracing::debug!(%client_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "recv error");
                break;
            }
        }
    }

    // Dropping the gateway's and the room's senders closes the writer's queue.
    state.on_disconnect(&client_id).await;
    drain_writer(writer, &client_id).await;
    conn.close().await?;
    // _guard drops here; its cleanup is a no-op after on_disconnect.
    Ok(())
}

/// Waits for the writer to flush its queue, aborting it after
/// [`WRITER_DRAIN_TIMEOUT`].
async fn drain_writer(writer: JoinHandle<()>, client_id: &ClientId) {
    let abort = writer.abort_handle();
    match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(%client_id, error = %e, "writer task failed"),
        Err(_) => {
            tracing::debug!(%client_id, "writer still busy, aborting");
            abort.abort();
        }
    }
}

/// Drains the client's outbound queue onto the wire.
fn spawn_writer<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    client_id: ClientId,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let bytes = match state.codec.encode(&message) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(%client_id, kind = message.kind(), error = %e, "encode failed");
                    continue;
                }
            };
            if let Err(e) = conn.send(&bytes).await {
                tracing::debug!(%client_id, error = %e, "send failed, stopping writer");
                break;
            }
        }
    })
}
