//! Unified error type for the Synchro server.

use std::net::SocketAddr;
use std::time::Duration;

use synchro_protocol::ProtocolError;
use synchro_session::SessionError;
use synchro_transport::TransportError;
use synchro_world::WorldError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl, so
/// `?` converts errors from any layer without ceremony.
#[derive(Debug, thiserror::Error)]
pub enum SynchroError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, opcode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (duplicate or unknown connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The world actor is gone or refused a request.
    #[error(transparent)]
    World(#[from] WorldError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An accepted socket never finished the WebSocket upgrade.
    #[error("handshake with {peer} timed out after {after:?}")]
    HandshakeTimeout { peer: SocketAddr, after: Duration },
}
