//! Big-endian cursors over a byte buffer.
//!
//! [`Writer`] owns a buffer that is allocated ONCE at its final size: the
//! caller measures the frame first (see [`measure_value`](crate::measure_value))
//! and then fills it. There is no dynamic growth, so an under-measured frame
//! shows up as an [`ProtocolError::OutOfRange`] instead of a silent realloc.
//!
//! [`Reader`] borrows the received bytes and walks them with its own offset.
//! Every read is bounds-checked; nothing past `len()` is ever touched.
//!
//! All multi-byte numbers are big-endian ("network order"), no exceptions.

use crate::ProtocolError;

/// Width of the length prefix in front of every string.
pub const STRING_PREFIX_LEN: usize = 2;

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Generates one `write_*` method per fixed-width scalar.
///
/// `to_be_bytes()` gives us the big-endian representation as an array,
/// which we then copy into the buffer at the current offset.
macro_rules! write_be {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Writes a big-endian `", stringify!($ty), "` and advances the offset.")]
            pub fn $name(&mut self, value: $ty) -> Result<(), ProtocolError> {
                self.put(&value.to_be_bytes())
            }
        )*
    };
}

/// A cursor that fills a fixed-capacity buffer from offset 0 onwards.
#[derive(Debug, Clone)]
pub struct Writer {
    buf: Vec<u8>,
    offset: usize,
}

impl Writer {
    /// Allocates a zeroed buffer of exactly `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            offset: 0,
        }
    }

    /// Current write position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total size of the buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Copies `bytes` at the current offset.
    pub fn put(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let end = self.check(bytes.len())?;
        self.buf[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    write_be! {
        write_u8 => u8,
        write_u16 => u16,
        write_u32 => u32,
        write_u64 => u64,
        write_i8 => i8,
        write_i16 => i16,
        write_i32 => i32,
        write_i64 => i64,
        write_f32 => f32,
        write_f64 => f64,
    }

    /// Writes a u16 byte-length prefix followed by the UTF-8 bytes.
    ///
    /// The length counts BYTES, not characters: `"é"` is 2 bytes long.
    pub fn write_string(&mut self, value: &str) -> Result<(), ProtocolError> {
        let len = u16::try_from(value.len())
            .map_err(|_| ProtocolError::StringTooLong(value.len()))?;
        // Check the whole string up front so a failure leaves the
        // offset untouched.
        self.check(STRING_PREFIX_LEN + value.len())?;
        self.write_u16(len)?;
        self.put(value.as_bytes())
    }

    /// Consumes the writer and returns the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn check(&self, needed: usize) -> Result<usize, ProtocolError> {
        let end = self.offset + needed;
        if end > self.buf.len() {
            return Err(ProtocolError::OutOfRange {
                offset: self.offset,
                needed,
                len: self.buf.len(),
            });
        }
        Ok(end)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

macro_rules! read_be {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Reads a big-endian `", stringify!($ty), "` and advances the offset.")]
            pub fn $name(&mut self) -> Result<$ty, ProtocolError> {
                Ok(<$ty>::from_be_bytes(self.take_array()?))
            }
        )*
    };
}

/// A cursor that decodes values from a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Starts reading `buf` at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the read position. Positions past the end are allowed here;
    /// the next read reports them as out of range.
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    /// Length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes left between the offset and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::OutOfRange {
                offset: self.offset,
                needed: n,
                len: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    read_be! {
        read_u8 => u8,
        read_u16 => u16,
        read_u32 => u32,
        read_u64 => u64,
        read_i8 => i8,
        read_i16 => i16,
        read_i32 => i32,
        read_i64 => i64,
        read_f32 => f32,
        read_f64 => f64,
    }

    /// Reads a u16 byte-length prefix and then exactly that many bytes.
    ///
    /// A prefix that claims more bytes than remain is an error, and the
    /// offset is left where the prefix started.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let start = self.offset;
        let len = usize::from(self.read_u16()?);
        let bytes = match self.take(len) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.offset = start;
                return Err(e);
            }
        };
        Ok(std::str::from_utf8(bytes)?.to_owned())
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
