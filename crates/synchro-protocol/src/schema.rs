//! Type descriptors: self-describing byte layouts.
//!
//! A [`Descriptor`] says how a value is laid out on the wire. It is a closed,
//! recursive "sum type":
//!
//! ```text
//! Descriptor
//! ├── Scalar(u8 | u16 | u32 | u64 | i8 | i16 | i32 | i64 | f32 | f64 | string)
//! ├── Struct([Field { name, Descriptor }, ...])   named, ordered
//! ├── Tuple([Descriptor, ...])                     unnamed, ordered
//! └── Array(Descriptor × len)                      fixed length
//! ```
//!
//! The in-memory side is [`Value`], which mirrors the same shape. Three
//! free functions walk a descriptor and a value together:
//!
//! - [`measure`] / [`measure_value`]: how many bytes will this take?
//! - [`write`]: value → bytes (through a [`Writer`])
//! - [`read`]: bytes → value (through a [`Reader`])
//!
//! Descriptors hold no per-call state, so one instance (typically a
//! `LazyLock` static) is shared by every encode/decode in the process.

use std::fmt;

use crate::cursor::{Reader, Writer, STRING_PREFIX_LEN};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// The leaf kinds of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// u16 byte-length prefix followed by UTF-8 bytes.
    String,
}

impl ScalarKind {
    /// Encoded width, or `None` for the variable-size `String`.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::String => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// One named field of a [`Struct`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: Descriptor,
}

impl Field {
    pub fn new(name: impl Into<String>, descriptor: Descriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// Named fields, encoded back to back in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    fields: Vec<Field>,
}

impl Struct {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Writes a [`Value::Struct`], looking each field up by name.
    pub fn write(&self, writer: &mut Writer, value: &Value) -> Result<(), ProtocolError> {
        let Value::Struct(_) = value else {
            return Err(ProtocolError::mismatch("struct"));
        };
        for field in &self.fields {
            let v = value
                .field(&field.name)
                .ok_or_else(|| ProtocolError::mismatch(format!("field `{}`", field.name)))?;
            write(writer, &field.descriptor, v)?;
        }
        Ok(())
    }

    pub fn read(&self, reader: &mut Reader<'_>) -> Result<Value, ProtocolError> {
        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            out.push((field.name.clone(), read(reader, &field.descriptor)?));
        }
        Ok(Value::Struct(out))
    }
}

/// Unnamed elements, encoded back to back in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    elements: Vec<Descriptor>,
}

impl Tuple {
    pub fn new(elements: Vec<Descriptor>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Descriptor] {
        &self.elements
    }

    /// Encoded size of `value` laid out as this tuple.
    pub fn measure_value(&self, value: &Value) -> Result<usize, ProtocolError> {
        match value {
            Value::Tuple(items) if items.len() == self.elements.len() => self
                .elements
                .iter()
                .zip(items)
                .map(|(d, v)| measure_value(d, v))
                .sum(),
            _ => Err(ProtocolError::mismatch(format!(
                "tuple of {} elements",
                self.elements.len()
            ))),
        }
    }

    pub fn write(&self, writer: &mut Writer, value: &Value) -> Result<(), ProtocolError> {
        let Value::Tuple(items) = value else {
            return Err(ProtocolError::mismatch("tuple"));
        };
        if items.len() != self.elements.len() {
            return Err(ProtocolError::mismatch(format!(
                "tuple of {} elements",
                self.elements.len()
            )));
        }
        for (descriptor, item) in self.elements.iter().zip(items) {
            write(writer, descriptor, item)?;
        }
        Ok(())
    }

    pub fn read(&self, reader: &mut Reader<'_>) -> Result<Value, ProtocolError> {
        let mut out = Vec::with_capacity(self.elements.len());
        for descriptor in &self.elements {
            out.push(read(reader, descriptor)?);
        }
        Ok(Value::Tuple(out))
    }

    /// Repositions `reader` at `offset`, then reads the tuple.
    ///
    /// Frame payloads start after the opcode byte, so decoders call this
    /// with `offset = 1`.
    pub fn read_at(&self, reader: &mut Reader<'_>, offset: usize) -> Result<Vec<Value>, ProtocolError> {
        reader.seek(offset);
        match self.read(reader)? {
            Value::Tuple(items) => Ok(items),
            _ => Err(ProtocolError::mismatch("tuple")),
        }
    }
}

/// `len` repetitions of one element layout. No length prefix on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub element: Box<Descriptor>,
    pub len: usize,
}

/// A complete byte layout.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Scalar(ScalarKind),
    Struct(Struct),
    Tuple(Tuple),
    Array(ArrayType),
}

impl Descriptor {
    pub const U8: Self = Self::Scalar(ScalarKind::U8);
    pub const U16: Self = Self::Scalar(ScalarKind::U16);
    pub const U32: Self = Self::Scalar(ScalarKind::U32);
    pub const U64: Self = Self::Scalar(ScalarKind::U64);
    pub const I8: Self = Self::Scalar(ScalarKind::I8);
    pub const I16: Self = Self::Scalar(ScalarKind::I16);
    pub const I32: Self = Self::Scalar(ScalarKind::I32);
    pub const I64: Self = Self::Scalar(ScalarKind::I64);
    pub const F32: Self = Self::Scalar(ScalarKind::F32);
    pub const F64: Self = Self::Scalar(ScalarKind::F64);
    pub const STRING: Self = Self::Scalar(ScalarKind::String);

    /// Shorthand for `Descriptor::Array`.
    pub fn array(element: Descriptor, len: usize) -> Self {
        Self::Array(ArrayType {
            element: Box::new(element),
            len,
        })
    }

    /// Shorthand for a struct descriptor from `(name, descriptor)` pairs.
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Descriptor)>) -> Self {
        Self::Struct(Struct::new(
            fields
                .into_iter()
                .map(|(name, d)| Field::new(name, d))
                .collect(),
        ))
    }

    /// Shorthand for a tuple descriptor.
    pub fn tuple(elements: impl IntoIterator<Item = Descriptor>) -> Self {
        Self::Tuple(Tuple::new(elements.into_iter().collect()))
    }

    /// `true` if the size is known without a value (no `string` inside).
    pub fn is_fixed_size(&self) -> bool {
        measure(self).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// An in-memory value shaped like some [`Descriptor`].
///
/// Struct values keep their fields as ordered `(name, value)` pairs. Writing
/// looks fields up by name, so the order inside a value does not matter,
/// but values produced by [`read`] always come back in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Struct(Vec<(String, Value)>),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    /// Looks up a struct field by name. `None` for non-structs.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Moves the string out, if this is one.
    pub fn into_string(self) -> Option<String> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::U64(v)
    }
}

// ---------------------------------------------------------------------------
// measure / write / read
// ---------------------------------------------------------------------------

/// Value-independent size of `descriptor` in bytes.
///
/// # Errors
/// [`ProtocolError::Unsized`] if the descriptor contains a `string`
/// anywhere; those can only be measured with [`measure_value`].
pub fn measure(descriptor: &Descriptor) -> Result<usize, ProtocolError> {
    match descriptor {
        Descriptor::Scalar(kind) => kind.fixed_size().ok_or(ProtocolError::Unsized),
        Descriptor::Struct(s) => s.fields.iter().map(|f| measure(&f.descriptor)).sum(),
        Descriptor::Tuple(t) => t.elements.iter().map(measure).sum(),
        Descriptor::Array(a) => Ok(measure(&a.element)? * a.len),
    }
}

/// Size of `value` encoded with `descriptor`, strings included.
///
/// This equals exactly how far [`write`] advances the writer for the
/// same value, which is what lets callers allocate frames up front.
pub fn measure_value(descriptor: &Descriptor, value: &Value) -> Result<usize, ProtocolError> {
    match (descriptor, value) {
        (Descriptor::Scalar(ScalarKind::String), Value::String(s)) => {
            Ok(STRING_PREFIX_LEN + s.len())
        }
        (Descriptor::Scalar(kind), v) => {
            check_scalar(*kind, v)?;
            kind.fixed_size().ok_or(ProtocolError::Unsized)
        }
        (Descriptor::Struct(s), Value::Struct(_)) => s
            .fields
            .iter()
            .map(|f| {
                let fv = value
                    .field(&f.name)
                    .ok_or_else(|| ProtocolError::mismatch(format!("field `{}`", f.name)))?;
                measure_value(&f.descriptor, fv)
            })
            .sum(),
        (Descriptor::Tuple(t), Value::Tuple(items)) if items.len() == t.elements.len() => {
            t.measure_value(value)
        }
        (Descriptor::Array(a), Value::Array(items)) if items.len() == a.len => {
            items.iter().map(|v| measure_value(&a.element, v)).sum()
        }
        (d, _) => Err(ProtocolError::mismatch(describe(d))),
    }
}

/// Serializes `value` according to `descriptor`, advancing `writer`.
pub fn write(writer: &mut Writer, descriptor: &Descriptor, value: &Value) -> Result<(), ProtocolError> {
    match (descriptor, value) {
        (Descriptor::Scalar(ScalarKind::U8), Value::U8(v)) => writer.write_u8(*v),
        (Descriptor::Scalar(ScalarKind::U16), Value::U16(v)) => writer.write_u16(*v),
        (Descriptor::Scalar(ScalarKind::U32), Value::U32(v)) => writer.write_u32(*v),
        (Descriptor::Scalar(ScalarKind::U64), Value::U64(v)) => writer.write_u64(*v),
        (Descriptor::Scalar(ScalarKind::I8), Value::I8(v)) => writer.write_i8(*v),
        (Descriptor::Scalar(ScalarKind::I16), Value::I16(v)) => writer.write_i16(*v),
        (Descriptor::Scalar(ScalarKind::I32), Value::I32(v)) => writer.write_i32(*v),
        (Descriptor::Scalar(ScalarKind::I64), Value::I64(v)) => writer.write_i64(*v),
        (Descriptor::Scalar(ScalarKind::F32), Value::F32(v)) => writer.write_f32(*v),
        (Descriptor::Scalar(ScalarKind::F64), Value::F64(v)) => writer.write_f64(*v),
        (Descriptor::Scalar(ScalarKind::String), Value::String(s)) => writer.write_string(s),
        (Descriptor::Struct(s), v) => s.write(writer, v),
        (Descriptor::Tuple(t), v) => t.write(writer, v),
        (Descriptor::Array(a), Value::Array(items)) if items.len() == a.len => {
            for item in items {
                write(writer, &a.element, item)?;
            }
            Ok(())
        }
        (d, _) => Err(ProtocolError::mismatch(describe(d))),
    }
}

/// Deserializes one value of shape `descriptor`, advancing `reader`.
pub fn read(reader: &mut Reader<'_>, descriptor: &Descriptor) -> Result<Value, ProtocolError> {
    Ok(match descriptor {
        Descriptor::Scalar(kind) => match kind {
            ScalarKind::U8 => Value::U8(reader.read_u8()?),
            ScalarKind::U16 => Value::U16(reader.read_u16()?),
            ScalarKind::U32 => Value::U32(reader.read_u32()?),
            ScalarKind::U64 => Value::U64(reader.read_u64()?),
            ScalarKind::I8 => Value::I8(reader.read_i8()?),
            ScalarKind::I16 => Value::I16(reader.read_i16()?),
            ScalarKind::I32 => Value::I32(reader.read_i32()?),
            ScalarKind::I64 => Value::I64(reader.read_i64()?),
            ScalarKind::F32 => Value::F32(reader.read_f32()?),
            ScalarKind::F64 => Value::F64(reader.read_f64()?),
            ScalarKind::String => Value::String(reader.read_string()?),
        },
        Descriptor::Struct(s) => s.read(reader)?,
        Descriptor::Tuple(t) => t.read(reader)?,
        Descriptor::Array(a) => {
            let mut items = Vec::with_capacity(a.len);
            for _ in 0..a.len {
                items.push(read(reader, &a.element)?);
            }
            Value::Array(items)
        }
    })
}

/// Encodes `value` into a freshly allocated buffer of exactly the right size.
pub fn encode(descriptor: &Descriptor, value: &Value) -> Result<Vec<u8>, ProtocolError> {
    let mut writer = Writer::new(measure_value(descriptor, value)?);
    write(&mut writer, descriptor, value)?;
    Ok(writer.into_bytes())
}

fn check_scalar(kind: ScalarKind, value: &Value) -> Result<(), ProtocolError> {
    let ok = matches!(
        (kind, value),
        (ScalarKind::U8, Value::U8(_))
            | (ScalarKind::U16, Value::U16(_))
            | (ScalarKind::U32, Value::U32(_))
            | (ScalarKind::U64, Value::U64(_))
            | (ScalarKind::I8, Value::I8(_))
            | (ScalarKind::I16, Value::I16(_))
            | (ScalarKind::I32, Value::I32(_))
            | (ScalarKind::I64, Value::I64(_))
            | (ScalarKind::F32, Value::F32(_))
            | (ScalarKind::F64, Value::F64(_))
            | (ScalarKind::String, Value::String(_))
    );
    if ok {
        Ok(())
    } else {
        Err(ProtocolError::mismatch(kind.to_string()))
    }
}

fn describe(descriptor: &Descriptor) -> String {
    match descriptor {
        Descriptor::Scalar(kind) => kind.to_string(),
        Descriptor::Struct(_) => "struct".into(),
        Descriptor::Tuple(t) => format!("tuple of {} elements", t.elements.len()),
        Descriptor::Array(a) => format!("array of {} elements", a.len),
    }
}
