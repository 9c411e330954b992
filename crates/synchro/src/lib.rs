//! # Synchro
//!
//! Real-time state synchronization server for small multiplayer worlds.
//!
//! Clients connect over WebSocket, announce a username with a JOINED
//! frame, and from then on may chat (SAY), move (MOVE) and ping (PING).
//! Every 100 ms the server broadcasts an UPDATE roster of all spawned
//! entities, skipping connections for which nothing changed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use synchro::prelude::*;
//!
//! # async fn start() -> Result<(), SynchroError> {
//! let config = ServerConfig::from_file("synchro.json")?;
//! let server = SynchroServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::SynchroError;
pub use server::{SynchroServer, SynchroServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{ConfigError, ServerConfig, SynchroError, SynchroServer, SynchroServerBuilder};
    pub use synchro_protocol::{ClientFrame, EntityState, Opcode, ProtocolError, ServerFrame};
    pub use synchro_session::SessionError;
    pub use synchro_tick::TickPolicy;
    pub use synchro_transport::{ConnectionId, TransportError};
    pub use synchro_world::{WorldConfig, WorldError, WorldHandle, WorldInfo};
}
