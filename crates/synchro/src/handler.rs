//! Per-connection handler: upgrade, register, pump frames, clean up.
//!
//! Each accepted socket gets its own Tokio task running this handler.
//! The flow is:
//!   0. Finish the WebSocket upgrade within the handshake timeout
//!   1. Register with the world → get an outbound queue and an entity id
//!   2. Spawn a writer task draining the outbound queue onto the socket
//!   3. Loop: receive frames → hand them to the world in arrival order
//!   4. On close or receive error: disconnect from the world, let the
//!      writer flush, close the socket

use std::sync::Arc;
use std::time::Duration;

use synchro_transport::{Connection, Handshake, PendingWebSocket, WebSocketConnection};
use synchro_world::WorldHandle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::SynchroError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    pending: PendingWebSocket,
    world: WorldHandle,
    handshake_timeout: Duration,
) -> Result<(), SynchroError> {
    let peer = pending.peer_addr();
    let conn = match tokio::time::timeout(handshake_timeout, pending.complete()).await {
        Ok(conn) => Arc::new(conn?),
        Err(_) => {
            return Err(SynchroError::HandshakeTimeout {
                peer,
                after: handshake_timeout,
            });
        }
    };
    let conn_id = conn.id();

    let (outbound, queue) = mpsc::unbounded_channel();
    let entity_id = world.connect(conn_id, outbound).await?;
    tracing::debug!(%conn_id, %entity_id, "connection registered");

    let writer = spawn_writer(Arc::clone(&conn), queue);
    let result = receive_loop(&conn, &world).await;

    // Removing the session drops the world's sender, so the writer drains
    // whatever is still queued and then stops.
    if let Err(e) = world.disconnect(conn_id).await {
        tracing::debug!(%conn_id, error = %e, "disconnect failed");
    }
    let _ = writer.await;
    let _ = conn.close().await;

    result
}

/// Forwards inbound frames to the world until the peer goes away.
async fn receive_loop(conn: &WebSocketConnection, world: &WorldHandle) -> Result<(), SynchroError> {
    let conn_id = conn.id();
    loop {
        match conn.recv().await {
            Ok(Some(data)) => world.deliver(conn_id, data).await?,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        }
    }
}

/// Writes queued frames to the socket in order. Stops when the queue
/// closes or a send fails; in the latter case the world notices the
/// closed queue on its next push.
fn spawn_writer(
    conn: Arc<WebSocketConnection>,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let conn_id = conn.id();
        while let Some(frame) = queue.recv().await {
            if let Err(e) = conn.send(&frame).await {
                tracing::debug!(%conn_id, error = %e, "send failed, writer stopping");
                break;
            }
        }
    })
}
