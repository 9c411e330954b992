//! Error types for the protocol layer.
//!
//! Everything that can go wrong while measuring, writing, or reading bytes
//! ends up here. A `ProtocolError` always describes ONE frame: the caller
//! drops that frame and carries on, the connection is never torn down for it.

use crate::Opcode;

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A read or write would cross the end of the buffer.
    ///
    /// Readers raise this for truncated frames and for string length
    /// prefixes that promise more bytes than remain. Writers raise it when
    /// the caller under-measured the buffer (writers never grow).
    #[error("out of range: {needed} bytes at offset {offset}, buffer holds {len}")]
    OutOfRange {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// A string is too long for its 16-bit length prefix.
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),

    /// A length-prefixed string did not contain valid UTF-8.
    #[error("invalid utf-8 in string field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The descriptor contains a `string`, so its size is only known
    /// for a concrete value. Use [`measure_value`](crate::measure_value).
    #[error("descriptor size depends on a string value")]
    Unsized,

    /// The value handed to `write`/`measure_value` does not have the shape
    /// the descriptor describes.
    #[error("value does not match descriptor: expected {expected}")]
    TypeMismatch { expected: String },

    /// An entity list is longer than the u16 count field can express.
    #[error("{0} entries exceed the u16 count field")]
    CountOverflow(usize),

    /// A frame with no bytes at all (not even the opcode).
    #[error("empty frame")]
    EmptyFrame,

    /// The leading byte is outside the opcode enumeration.
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The opcode is valid but not allowed in this direction
    /// (e.g. a client sending UPDATE).
    #[error("unexpected opcode {0:?} in this direction")]
    UnexpectedOpcode(Opcode),
}

impl ProtocolError {
    pub(crate) fn mismatch(expected: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
        }
    }
}
