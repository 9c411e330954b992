//! `SynchroServer` builder and server loop.
//!
//! This is the entry point for running a Synchro server. It ties together
//! all the layers: transport → world (session + protocol + tick).

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use synchro_transport::{Transport, WebSocketTransport};
use synchro_world::{WorldHandle, spawn_world};

use crate::handler::handle_connection;
use crate::{ServerConfig, SynchroError};

/// Builder for configuring and starting a Synchro server.
///
/// # Example
///
/// ```rust,no_run
/// use synchro::prelude::*;
///
/// # async fn start() -> Result<(), SynchroError> {
/// let server = SynchroServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct SynchroServerBuilder {
    bind_addr: Option<String>,
    config: ServerConfig,
}

impl SynchroServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind to. Takes precedence over
    /// `ServerConfig::bind_addr`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and starts the world actor.
    pub async fn build(self) -> Result<SynchroServer, SynchroError> {
        let handshake_timeout = self.config.handshake_timeout();
        let addr = self.bind_addr.unwrap_or(self.config.bind_addr);
        let transport = WebSocketTransport::bind(&addr).await?;
        let world = spawn_world(self.config.world);

        Ok(SynchroServer {
            transport,
            world,
            handshake_timeout,
        })
    }
}

impl Default for SynchroServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Synchro server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct SynchroServer {
    transport: WebSocketTransport,
    world: WorldHandle,
    handshake_timeout: Duration,
}

impl SynchroServer {
    /// Creates a new builder.
    pub fn builder() -> SynchroServerBuilder {
        SynchroServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SynchroError> {
        Ok(self.transport.local_addr()?)
    }

    /// A handle to the world this server feeds.
    pub fn world(&self) -> WorldHandle {
        self.world.clone()
    }

    /// Runs the accept loop until Ctrl-C.
    pub async fn run(self) -> Result<(), SynchroError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Runs the accept loop until `shutdown` completes, then stops the
    /// world.
    ///
    /// Each accepted socket is served by its own task, which also runs the
    /// WebSocket upgrade. A peer that stalls or botches the upgrade only
    /// costs its own task; the loop keeps accepting.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), SynchroError> {
        tracing::info!(addr = %self.local_addr()?, "synchro server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let world = self.world.clone();
                        let handshake_timeout = self.handshake_timeout;
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, world, handshake_timeout).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        self.world.shutdown().await?;
        Ok(())
    }
}
