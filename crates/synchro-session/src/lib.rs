//! Per-connection sessions and the registry that fans frames out.
//!
//! # How it fits in the stack
//!
//! ```text
//! World Layer (above)     ← owns one SessionRegistry, drives it from its actor loop
//!     ↕
//! Session Layer (this crate)  ← opcode state machine, roster, LEAVE/UPDATE fan-out
//!     ↕
//! Protocol Layer (below)  ← frame encode/decode
//! ```
//!
//! Nothing in here does I/O. Outbound frames are pushed onto per-connection
//! unbounded channels; whoever owns the receiving halves writes them to
//! the network.

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{BroadcastStats, Outbound, SessionRegistry};
pub use session::{
    BLANK_USERNAME, INVALID_USERNAME, Reaction, Session, SessionState, unix_millis,
};
