//! World actor: an isolated Tokio task that owns every session.
//!
//! The registry, the entities and the per-connection UPDATE cache all live
//! inside this one task. Connection handlers talk to it through a bounded
//! mpsc channel wrapped in a [`WorldHandle`]; the broadcast tick fires in
//! the same `select!` loop. One command or one tick runs to completion at
//! a time, so no lock is ever needed.

use synchro_protocol::ProtocolError;
use synchro_session::{BroadcastStats, Outbound, SessionError, SessionRegistry, unix_millis};
use synchro_tick::{TickMetrics, TickScheduler};
use synchro_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{WorldConfig, WorldError};

/// Commands sent to the world actor through its channel.
///
/// Variants with a `reply` are request/response: the caller waits on the
/// oneshot. `Frame` is fire-and-forget; the channel keeps per-sender order.
pub(crate) enum WorldCommand {
    /// Register a new connection.
    Connect {
        conn_id: ConnectionId,
        outbound: Outbound,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },

    /// One inbound frame from a connection.
    Frame { conn_id: ConnectionId, data: Vec<u8> },

    /// Remove a connection (closed or failed).
    Disconnect {
        conn_id: ConnectionId,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Request counters.
    GetInfo { reply: oneshot::Sender<WorldInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A snapshot of world counters.
#[derive(Debug, Clone)]
pub struct WorldInfo {
    /// Live connections, spawned or not.
    pub connections: usize,
    /// Connections that completed the join handshake.
    pub spawned: usize,
    /// Broadcast ticks fired so far.
    pub ticks: u64,
    /// Outcome of the most recent broadcast.
    pub last_broadcast: BroadcastStats,
    pub metrics: TickMetrics,
}

/// Handle to the running world actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Every connection
/// handler holds one.
#[derive(Clone)]
pub struct WorldHandle {
    sender: mpsc::Sender<WorldCommand>,
}

impl WorldHandle {
    /// Registers a connection and its outbound queue. Returns the entity id
    /// generated for it.
    pub async fn connect(
        &self,
        conn_id: ConnectionId,
        outbound: Outbound,
    ) -> Result<String, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorldCommand::Connect {
            conn_id,
            outbound,
            reply: reply_tx,
        })
        .await?;
        Ok(reply_rx.await.map_err(|_| WorldError::Unavailable)??)
    }

    /// Hands an inbound frame to the world (fire-and-forget).
    ///
    /// Frames from one handle are processed in the order they were
    /// delivered.
    pub async fn deliver(&self, conn_id: ConnectionId, data: Vec<u8>) -> Result<(), WorldError> {
        self.send(WorldCommand::Frame { conn_id, data }).await
    }

    /// Removes a connection; a spawned one triggers a LEAVE broadcast.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Result<(), WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorldCommand::Disconnect {
            conn_id,
            reply: reply_tx,
        })
        .await?;
        Ok(reply_rx.await.map_err(|_| WorldError::Unavailable)??)
    }

    pub async fn info(&self) -> Result<WorldInfo, WorldError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(WorldCommand::GetInfo { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| WorldError::Unavailable)
    }

    /// Tells the world to stop. Queued commands ahead of this one are
    /// still processed.
    pub async fn shutdown(&self) -> Result<(), WorldError> {
        self.send(WorldCommand::Shutdown).await
    }

    async fn send(&self, cmd: WorldCommand) -> Result<(), WorldError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| WorldError::Unavailable)
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct WorldActor {
    registry: SessionRegistry,
    scheduler: TickScheduler,
    last_broadcast: BroadcastStats,
    receiver: mpsc::Receiver<WorldCommand>,
}

impl WorldActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(
            interval_ms = self.scheduler.interval().as_millis() as u64,
            "world actor started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(WorldCommand::Shutdown) => {
                        tracing::info!("world shutting down");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _tick = self.scheduler.wait_for_tick() => {
                    self.broadcast();
                    self.scheduler.record_tick_end();
                }
            }
        }

        tracing::info!(
            connections = self.registry.len(),
            ticks = self.scheduler.tick_count(),
            "world actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: WorldCommand) {
        match cmd {
            WorldCommand::Connect {
                conn_id,
                outbound,
                reply,
            } => {
                let result = self.registry.register(conn_id, outbound);
                let _ = reply.send(result);
            }
            WorldCommand::Frame { conn_id, data } => self.handle_frame(conn_id, &data),
            WorldCommand::Disconnect { conn_id, reply } => {
                let result = self.registry.remove(conn_id).map(|_| ());
                let _ = reply.send(result);
            }
            WorldCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            // Intercepted by the loop.
            WorldCommand::Shutdown => {}
        }
    }

    fn handle_frame(&mut self, conn_id: ConnectionId, data: &[u8]) {
        match self.registry.handle_frame(conn_id, data, unix_millis()) {
            Ok(()) => {}
            Err(SessionError::Protocol(e @ ProtocolError::UnknownOpcode(_))) => {
                tracing::warn!(%conn_id, error = %e, "frame discarded");
            }
            Err(SessionError::Protocol(e)) => {
                tracing::debug!(%conn_id, error = %e, len = data.len(), "malformed frame discarded");
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "frame for unknown connection");
            }
        }
    }

    fn broadcast(&mut self) {
        match self.registry.broadcast_update() {
            Ok(stats) => self.last_broadcast = stats,
            Err(e) => tracing::warn!(error = %e, "update broadcast failed"),
        }
    }

    fn info(&self) -> WorldInfo {
        WorldInfo {
            connections: self.registry.len(),
            spawned: self.registry.spawned_count(),
            ticks: self.scheduler.tick_count(),
            last_broadcast: self.last_broadcast,
            metrics: self.scheduler.metrics().clone(),
        }
    }
}

/// Spawns the world actor task and returns a handle to it.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_world(config: WorldConfig) -> WorldHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = WorldActor {
        registry: SessionRegistry::new(),
        scheduler: TickScheduler::new(config.tick_config()),
        last_broadcast: BroadcastStats::default(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    WorldHandle { sender: tx }
}
