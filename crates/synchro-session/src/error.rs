//! Error types for the session layer.

use synchro_protocol::ProtocolError;
use synchro_transport::ConnectionId;

/// Errors that can occur while tracking sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A connection with this id is already registered. Ids come from a
    /// monotonic counter, so this means the same connection was
    /// registered twice.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// No session exists for the given connection (never registered, or
    /// already removed).
    #[error("no session for connection {0}")]
    NotFound(ConnectionId),

    /// The frame could not be decoded or a reply could not be encoded.
    /// Only the offending frame is affected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
