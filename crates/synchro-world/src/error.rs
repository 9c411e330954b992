//! Error types for the world layer.

use synchro_session::SessionError;

/// Errors that can occur when talking to the world actor.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The actor has stopped (shut down, or every handle was dropped and
    /// it exited). Its channel is closed.
    #[error("world is unavailable")]
    Unavailable,

    /// The registry refused the request.
    #[error(transparent)]
    Session(#[from] SessionError),
}
