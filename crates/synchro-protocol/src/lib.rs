//! Wire protocol for Synchro.
//!
//! This crate defines the bytes that clients and the server exchange:
//!
//! - **Schema** ([`Descriptor`], [`Value`], [`measure`], [`write`],
//!   [`read`]): self-describing byte layouts and the codec that walks them.
//! - **Cursors** ([`Writer`], [`Reader`]): big-endian primitives and
//!   length-prefixed strings over a fixed-size buffer.
//! - **Frames** ([`Opcode`], [`ClientFrame`], [`ServerFrame`]): the
//!   opcode-tagged messages built from the two layers above.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (entity state). It doesn't know about connections or ticks: it only
//! knows how to lay values out in bytes and read them back.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientFrame) → Session (entity, spawned?)
//! ```

mod cursor;
mod error;
mod frame;
mod schema;

pub use cursor::{Reader, Writer, STRING_PREFIX_LEN};
pub use error::ProtocolError;
pub use frame::{
    encode_update, ClientFrame, EntityState, Opcode, ServerFrame, ENTITY, ERROR_NOTICE,
    JOIN_REQUEST, LEAVE_NOTICE, MOVE_REQUEST,
};
pub use schema::{
    encode, measure, measure_value, read, write, ArrayType, Descriptor, Field, ScalarKind, Struct,
    Tuple, Value,
};
