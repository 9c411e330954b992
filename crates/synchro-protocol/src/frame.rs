//! Opcode-tagged frames: the messages that actually travel on the socket.
//!
//! Every frame is one opcode byte followed by an opcode-specific payload:
//!
//! ```text
//! ┌────────┬──────────────────────────────────────────────┐
//! │ opcode │ payload (layout chosen by the opcode)        │
//! │  1 B   │                                              │
//! └────────┴──────────────────────────────────────────────┘
//!
//! JOINED  c→s  Tuple[string username]
//!         s→c  Entity
//! LEAVE   s→c  Tuple[string id]
//! SAY     c→s→c  opaque, relayed byte for byte
//! MOVE    c→s  Tuple[string id, u64 move]
//! PING    c→s→c  opaque, echoed byte for byte
//! UPDATE  s→c  u16 count, count × Entity
//! ERROR   s→c  Tuple[string message]
//!
//! Entity = Struct{ id: string, username: string, move: u64, connectedAt: u64 }
//! ```
//!
//! Inbound traffic is parsed with [`ClientFrame::decode`]; outbound traffic
//! is built with [`ServerFrame::encode`]. The reverse directions exist too,
//! for client code and test harnesses.

use std::sync::LazyLock;

use crate::cursor::{Reader, STRING_PREFIX_LEN, Writer};
use crate::schema::{self, Descriptor, Tuple, Value};
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The closed set of frame tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Joined = 1,
    Leave = 2,
    Say = 3,
    Move = 4,
    Ping = 5,
    Pong = 6,
    Update = 7,
    Error = 8,
}

impl Opcode {
    /// Reads the tag of `frame` without decoding the payload.
    pub fn of(frame: &[u8]) -> Result<Self, ProtocolError> {
        let tag = *frame.first().ok_or(ProtocolError::EmptyFrame)?;
        Self::try_from(tag)
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Opcode::Joined,
            2 => Opcode::Leave,
            3 => Opcode::Say,
            4 => Opcode::Move,
            5 => Opcode::Ping,
            6 => Opcode::Pong,
            7 => Opcode::Update,
            8 => Opcode::Error,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, ProtocolError> {
        Self::from_tag(tag).ok_or(ProtocolError::UnknownOpcode(tag))
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as u8
    }
}

// ---------------------------------------------------------------------------
// Layouts
// ---------------------------------------------------------------------------

/// Payload of a client JOINED: `Tuple[string username]`.
pub static JOIN_REQUEST: LazyLock<Tuple> = LazyLock::new(|| Tuple::new(vec![Descriptor::STRING]));

/// Payload of a client MOVE: `Tuple[string id, u64 move]`.
pub static MOVE_REQUEST: LazyLock<Tuple> =
    LazyLock::new(|| Tuple::new(vec![Descriptor::STRING, Descriptor::U64]));

/// Payload of LEAVE: `Tuple[string id]`.
pub static LEAVE_NOTICE: LazyLock<Tuple> = LazyLock::new(|| Tuple::new(vec![Descriptor::STRING]));

/// Payload of ERROR: `Tuple[string message]`.
pub static ERROR_NOTICE: LazyLock<Tuple> = LazyLock::new(|| Tuple::new(vec![Descriptor::STRING]));

/// One synchronized participant, as it appears in JOINED replies and UPDATEs.
pub static ENTITY: LazyLock<Descriptor> = LazyLock::new(|| {
    Descriptor::structure([
        ("id", Descriptor::STRING),
        ("username", Descriptor::STRING),
        ("move", Descriptor::U64),
        ("connectedAt", Descriptor::U64),
    ])
});

/// Width of the opcode byte.
const TAG_LEN: usize = 1;
/// Width of the UPDATE entity count.
const COUNT_LEN: usize = 2;
/// Smallest encoded entity: two empty strings and two u64s.
const MIN_ENTITY_LEN: usize = 2 * STRING_PREFIX_LEN + 2 * 8;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// The synchronized state of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityState {
    /// Opaque identifier, generated by the server when the connection opens.
    pub id: String,
    /// Empty until the join handshake completes.
    pub username: String,
    /// Input/movement bitfield, meaning defined by clients.
    pub movement: u64,
    /// Milliseconds since the Unix epoch at join time; 0 before.
    pub connected_at: u64,
}

impl EntityState {
    pub fn to_value(&self) -> Value {
        Value::Struct(vec![
            ("id".into(), Value::from(self.id.as_str())),
            ("username".into(), Value::from(self.username.as_str())),
            ("move".into(), Value::U64(self.movement)),
            ("connectedAt".into(), Value::U64(self.connected_at)),
        ])
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let text = |name: &str| {
            value
                .field(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| ProtocolError::TypeMismatch {
                    expected: format!("string field `{name}`"),
                })
        };
        let number = |name: &str| {
            value
                .field(name)
                .and_then(Value::as_u64)
                .ok_or_else(|| ProtocolError::TypeMismatch {
                    expected: format!("u64 field `{name}`"),
                })
        };
        Ok(Self {
            id: text("id")?,
            username: text("username")?,
            movement: number("move")?,
            connected_at: number("connectedAt")?,
        })
    }

    /// Encoded size of this entity inside a frame.
    pub fn encoded_len(&self) -> Result<usize, ProtocolError> {
        schema::measure_value(&ENTITY, &self.to_value())
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// A decoded frame sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Join request carrying the self-asserted username (untrimmed).
    Join { username: String },
    /// Chat line. Holds the COMPLETE received frame, tag included,
    /// because the server relays it without looking inside.
    Say(Vec<u8>),
    /// Movement update.
    Move { id: String, movement: u64 },
    /// Latency check. Complete frame, echoed as-is.
    Ping(Vec<u8>),
}

impl ClientFrame {
    /// Parses one inbound frame.
    ///
    /// # Errors
    /// - [`ProtocolError::EmptyFrame`] / [`ProtocolError::UnknownOpcode`]
    /// - [`ProtocolError::UnexpectedOpcode`] for server-only tags
    /// - [`ProtocolError::OutOfRange`] for truncated payloads
    /// - [`ProtocolError::InvalidUtf8`] for malformed strings
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let opcode = Opcode::of(data)?;
        let mut reader = Reader::new(data);
        match opcode {
            Opcode::Joined => {
                let mut items = JOIN_REQUEST.read_at(&mut reader, TAG_LEN)?.into_iter();
                Ok(Self::Join {
                    username: next_string(&mut items)?,
                })
            }
            Opcode::Say => Ok(Self::Say(data.to_vec())),
            Opcode::Move => {
                let mut items = MOVE_REQUEST.read_at(&mut reader, TAG_LEN)?.into_iter();
                let id = next_string(&mut items)?;
                let movement = items
                    .next()
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| ProtocolError::mismatch("u64"))?;
                Ok(Self::Move { id, movement })
            }
            Opcode::Ping => Ok(Self::Ping(data.to_vec())),
            op @ (Opcode::Leave | Opcode::Pong | Opcode::Update | Opcode::Error) => {
                Err(ProtocolError::UnexpectedOpcode(op))
            }
        }
    }

    /// The tag this frame carries.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Join { .. } => Opcode::Joined,
            Self::Say(_) => Opcode::Say,
            Self::Move { .. } => Opcode::Move,
            Self::Ping(_) => Opcode::Ping,
        }
    }

    /// Encodes a client frame (what a browser client would send).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Join { username } => {
                tagged_tuple(Opcode::Joined, &JOIN_REQUEST, vec![username.as_str().into()])
            }
            Self::Move { id, movement } => tagged_tuple(
                Opcode::Move,
                &MOVE_REQUEST,
                vec![id.as_str().into(), Value::U64(*movement)],
            ),
            Self::Say(raw) | Self::Ping(raw) => Ok(raw.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// A frame the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Join accepted: the caller's full entity.
    Joined(EntityState),
    /// A spawned participant disconnected.
    Leave { id: String },
    /// Relayed chat frame, byte for byte.
    Say(Vec<u8>),
    /// Echoed ping frame, byte for byte.
    Ping(Vec<u8>),
    /// Roster snapshot of every spawned entity.
    Update(Vec<EntityState>),
    /// Request rejected; human-readable reason.
    Error { message: String },
}

impl ServerFrame {
    /// Builds the bytes for this frame. The buffer is measured first and
    /// allocated once.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Joined(entity) => {
                let value = entity.to_value();
                let size = TAG_LEN + schema::measure_value(&ENTITY, &value)?;
                let mut w = Writer::new(size);
                w.write_u8(Opcode::Joined.into())?;
                schema::write(&mut w, &ENTITY, &value)?;
                Ok(w.into_bytes())
            }
            Self::Leave { id } => tagged_tuple(Opcode::Leave, &LEAVE_NOTICE, vec![id.as_str().into()]),
            Self::Error { message } => {
                tagged_tuple(Opcode::Error, &ERROR_NOTICE, vec![message.as_str().into()])
            }
            Self::Say(raw) | Self::Ping(raw) => Ok(raw.clone()),
            Self::Update(entities) => encode_update(entities),
        }
    }

    /// Parses a server frame (client side / tests).
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let opcode = Opcode::of(data)?;
        let mut reader = Reader::new(data);
        reader.seek(TAG_LEN);
        match opcode {
            Opcode::Joined => Ok(Self::Joined(EntityState::from_value(schema::read(
                &mut reader,
                &ENTITY,
            )?)?)),
            Opcode::Leave => {
                let mut items = LEAVE_NOTICE.read_at(&mut reader, TAG_LEN)?.into_iter();
                Ok(Self::Leave {
                    id: next_string(&mut items)?,
                })
            }
            Opcode::Say => Ok(Self::Say(data.to_vec())),
            Opcode::Ping => Ok(Self::Ping(data.to_vec())),
            Opcode::Update => {
                let count = usize::from(reader.read_u16()?);
                let mut entities = Vec::with_capacity(update_capacity(count, reader.remaining()));
                for _ in 0..count {
                    entities.push(EntityState::from_value(schema::read(&mut reader, &ENTITY)?)?);
                }
                Ok(Self::Update(entities))
            }
            Opcode::Error => {
                let mut items = ERROR_NOTICE.read_at(&mut reader, TAG_LEN)?.into_iter();
                Ok(Self::Error {
                    message: next_string(&mut items)?,
                })
            }
            op @ (Opcode::Move | Opcode::Pong) => Err(ProtocolError::UnexpectedOpcode(op)),
        }
    }
}

/// Builds an UPDATE frame: tag, u16 count, then each entity in order.
pub fn encode_update(entities: &[EntityState]) -> Result<Vec<u8>, ProtocolError> {
    let count =
        u16::try_from(entities.len()).map_err(|_| ProtocolError::CountOverflow(entities.len()))?;
    let values: Vec<Value> = entities.iter().map(EntityState::to_value).collect();

    let mut size = TAG_LEN + COUNT_LEN;
    for value in &values {
        size += schema::measure_value(&ENTITY, value)?;
    }

    let mut w = Writer::new(size);
    w.write_u8(Opcode::Update.into())?;
    w.write_u16(count)?;
    for value in &values {
        schema::write(&mut w, &ENTITY, value)?;
    }
    Ok(w.into_bytes())
}

/// Preallocation for an UPDATE decode: the wire count, capped by how many
/// of the smallest possible entities the remaining bytes could hold.
fn update_capacity(count: usize, remaining: usize) -> usize {
    count.min(remaining / MIN_ENTITY_LEN)
}

fn tagged_tuple(opcode: Opcode, layout: &Tuple, items: Vec<Value>) -> Result<Vec<u8>, ProtocolError> {
    let value = Value::Tuple(items);
    let mut w = Writer::new(TAG_LEN + layout.measure_value(&value)?);
    w.write_u8(opcode.into())?;
    layout.write(&mut w, &value)?;
    Ok(w.into_bytes())
}

fn next_string(items: &mut impl Iterator<Item = Value>) -> Result<String, ProtocolError> {
    items
        .next()
        .and_then(Value::into_string)
        .ok_or_else(|| ProtocolError::mismatch("string"))
}
