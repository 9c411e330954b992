//! One connection's participant and the opcode state machine that drives it.
//!
//! ```text
//!   Unspawned ──(JOINED, non-blank username)──→ Spawned
//!       │  ↑                                       │
//!       └──┘ (blank / non-UTF-8 username:          └──(close)──→ removed
//!             ERROR reply, may retry)
//! ```
//!
//! - While **Unspawned** only JOINED does anything. SAY, MOVE and PING
//!   are dropped without a reply.
//! - While **Spawned** JOINED is dropped; SAY, MOVE and PING are served.
//!
//! The session never touches the network. It returns a [`Reaction`] and
//! the registry decides who receives what.

use std::time::{SystemTime, UNIX_EPOCH};

use synchro_protocol::{ClientFrame, EntityState, Opcode, ProtocolError, ServerFrame};
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Sent back when a JOINED username trims down to nothing.
pub const BLANK_USERNAME: &str = "username must not be blank";

/// Sent back when a JOINED username is not valid UTF-8.
pub const INVALID_USERNAME: &str = "username must be valid UTF-8";

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Whether the participant has completed the join handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, not yet part of the shared world. Not broadcast.
    Unspawned,
    /// Joined. Included in every UPDATE.
    Spawned,
}

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// What the registry must do after a session handled a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Nothing happened (precondition not met).
    Ignored,
    /// The entity changed; the next UPDATE carries it.
    Updated,
    /// Send these bytes to the sender only.
    Reply(Vec<u8>),
    /// Send these bytes to every spawned connection, sender included.
    Relay(Vec<u8>),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The server's record of one connection.
#[derive(Debug, Clone)]
pub struct Session {
    entity: EntityState,
    state: SessionState,
}

impl Session {
    /// A fresh, unspawned session with the given entity id, empty username,
    /// zero movement bits and a zero join time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            entity: EntityState {
                id: id.into(),
                ..EntityState::default()
            },
            state: SessionState::Unspawned,
        }
    }

    /// A fresh session with a random UUID v4 entity id.
    pub fn with_random_id() -> Self {
        Self::new(generate_entity_id())
    }

    pub fn entity(&self) -> &EntityState {
        &self.entity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_spawned(&self) -> bool {
        self.state == SessionState::Spawned
    }

    /// Handles one raw inbound frame.
    ///
    /// The opcode is checked against the current state BEFORE the payload is
    /// decoded, so a garbage MOVE from an unspawned client is just ignored.
    ///
    /// # Errors
    /// Any [`ProtocolError`] from decoding, except a non-UTF-8 JOINED
    /// username, which is answered with an ERROR frame instead.
    pub fn handle_frame(&mut self, data: &[u8], now_ms: u64) -> Result<Reaction, ProtocolError> {
        let opcode = Opcode::of(data)?;
        if !self.accepts(opcode) {
            trace!(entity_id = %self.entity.id, ?opcode, state = ?self.state, "frame ignored");
            return Ok(Reaction::Ignored);
        }

        let frame = match ClientFrame::decode(data) {
            Ok(frame) => frame,
            Err(ProtocolError::InvalidUtf8(_)) if opcode == Opcode::Joined => {
                return self.reject(INVALID_USERNAME);
            }
            Err(e) => return Err(e),
        };
        self.handle(frame, now_ms)
    }

    /// Handles an already decoded frame.
    pub fn handle(&mut self, frame: ClientFrame, now_ms: u64) -> Result<Reaction, ProtocolError> {
        if !self.accepts(frame.opcode()) {
            trace!(entity_id = %self.entity.id, opcode = ?frame.opcode(), state = ?self.state, "frame ignored");
            return Ok(Reaction::Ignored);
        }

        match frame {
            ClientFrame::Join { username } => self.join(&username, now_ms),
            ClientFrame::Say(raw) => Ok(Reaction::Relay(raw)),
            ClientFrame::Move { id, movement } => {
                // The client-supplied id replaces the server-generated one.
                self.entity.id = id;
                self.entity.movement = movement;
                Ok(Reaction::Updated)
            }
            ClientFrame::Ping(raw) => Ok(Reaction::Reply(raw)),
        }
    }

    /// Whether `opcode` is served in the current state. Server-only opcodes
    /// pass so that decoding reports them.
    fn accepts(&self, opcode: Opcode) -> bool {
        match opcode {
            Opcode::Joined => self.state == SessionState::Unspawned,
            Opcode::Say | Opcode::Move | Opcode::Ping => self.state == SessionState::Spawned,
            Opcode::Leave | Opcode::Pong | Opcode::Update | Opcode::Error => true,
        }
    }

    fn join(&mut self, username: &str, now_ms: u64) -> Result<Reaction, ProtocolError> {
        let username = username.trim();
        if username.is_empty() {
            return self.reject(BLANK_USERNAME);
        }

        self.entity.username = username.to_owned();
        self.entity.connected_at = now_ms;
        self.state = SessionState::Spawned;
        info!(entity_id = %self.entity.id, username, "joined");

        Ok(Reaction::Reply(ServerFrame::Joined(self.entity.clone()).encode()?))
    }

    fn reject(&self, message: &str) -> Result<Reaction, ProtocolError> {
        debug!(entity_id = %self.entity.id, reason = message, "join rejected");
        let frame = ServerFrame::Error {
            message: message.to_owned(),
        };
        Ok(Reaction::Reply(frame.encode()?))
    }
}

/// Milliseconds since the Unix epoch, 0 if the clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A random UUID v4 in its hyphenated lowercase form.
fn generate_entity_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join_frame(username: &str) -> Vec<u8> {
        ClientFrame::Join {
            username: username.into(),
        }
        .encode()
        .unwrap()
    }

    fn spawned(name: &str) -> Session {
        let mut s = Session::new("id-1");
        s.handle_frame(&join_frame(name), 1_000).unwrap();
        s
    }

    // -- Construction -----------------------------------------------------

    #[test]
    fn test_new_session_is_unspawned_with_placeholders() {
        let s = Session::new("abc");
        assert_eq!(s.state(), SessionState::Unspawned);
        assert_eq!(s.entity().id, "abc");
        assert_eq!(s.entity().username, "");
        assert_eq!(s.entity().movement, 0);
        assert_eq!(s.entity().connected_at, 0);
    }

    #[test]
    fn test_generate_entity_id_is_uuid_v4() {
        let id = generate_entity_id();
        assert_eq!(id.len(), 36);
        let parsed = Uuid::parse_str(&id).expect("canonical uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn test_generate_entity_id_is_unique() {
        assert_ne!(generate_entity_id(), generate_entity_id());
        assert_ne!(Session::with_random_id().entity().id, Session::with_random_id().entity().id);
    }

    // -- JOINED -----------------------------------------------------------

    #[test]
    fn test_join_trims_username_and_replies_with_entity() {
        let mut s = Session::new("id-1");
        let reaction = s.handle_frame(&join_frame("  alice \t"), 42).unwrap();

        assert!(s.is_spawned());
        assert_eq!(s.entity().username, "alice");
        assert_eq!(s.entity().connected_at, 42);

        let Reaction::Reply(bytes) = reaction else {
            panic!("expected a reply, got {reaction:?}");
        };
        assert_eq!(
            ServerFrame::decode(&bytes).unwrap(),
            ServerFrame::Joined(s.entity().clone())
        );
    }

    #[test]
    fn test_join_blank_username_replies_error_and_stays_unspawned() {
        let mut s = Session::new("id-1");
        for name in ["", "   ", "\t\n"] {
            let reaction = s.handle_frame(&join_frame(name), 1).unwrap();
            let Reaction::Reply(bytes) = reaction else {
                panic!("expected an error reply");
            };
            assert_eq!(
                ServerFrame::decode(&bytes).unwrap(),
                ServerFrame::Error {
                    message: BLANK_USERNAME.into()
                }
            );
            assert_eq!(s.state(), SessionState::Unspawned);
            assert_eq!(s.entity().connected_at, 0);
        }

        // Retry with a valid name works.
        s.handle_frame(&join_frame("bob"), 1).unwrap();
        assert!(s.is_spawned());
    }

    #[test]
    fn test_join_invalid_utf8_replies_error() {
        let mut s = Session::new("id-1");
        let frame = [1, 0x00, 0x02, 0xC3, 0x28];
        let reaction = s.handle_frame(&frame, 1).unwrap();
        let Reaction::Reply(bytes) = reaction else {
            panic!("expected an error reply");
        };
        assert_eq!(
            ServerFrame::decode(&bytes).unwrap(),
            ServerFrame::Error {
                message: INVALID_USERNAME.into()
            }
        );
        assert!(!s.is_spawned());
    }

    #[test]
    fn test_join_truncated_is_protocol_error() {
        let mut s = Session::new("id-1");
        let err = s.handle_frame(&[1, 0x00, 0x09, b'a'], 1).unwrap_err();
        assert!(matches!(err, ProtocolError::OutOfRange { .. }));
        assert!(!s.is_spawned());
    }

    #[test]
    fn test_second_join_is_ignored() {
        let mut s = spawned("alice");
        let reaction = s.handle_frame(&join_frame("mallory"), 9_999).unwrap();
        assert_eq!(reaction, Reaction::Ignored);
        assert_eq!(s.entity().username, "alice");
        assert_eq!(s.entity().connected_at, 1_000);
    }

    // -- Gating -----------------------------------------------------------

    #[test]
    fn test_unspawned_ignores_say_move_ping() {
        let mut s = Session::new("id-1");
        let mv = ClientFrame::Move {
            id: "x".into(),
            movement: 5,
        }
        .encode()
        .unwrap();
        for frame in [vec![3, 1, 2], mv, vec![5]] {
            assert_eq!(s.handle_frame(&frame, 1).unwrap(), Reaction::Ignored);
        }
        assert_eq!(s.entity().id, "id-1");
        assert_eq!(s.entity().movement, 0);
    }

    #[test]
    fn test_unspawned_ignores_malformed_move() {
        // Gating happens before decoding.
        let mut s = Session::new("id-1");
        assert_eq!(s.handle_frame(&[4, 0xFF], 1).unwrap(), Reaction::Ignored);
    }

    #[test]
    fn test_server_opcodes_are_rejected_in_any_state() {
        let mut fresh = Session::new("id-1");
        let mut joined = spawned("alice");
        for tag in [2u8, 6, 7, 8] {
            assert!(matches!(
                fresh.handle_frame(&[tag], 1),
                Err(ProtocolError::UnexpectedOpcode(_))
            ));
            assert!(matches!(
                joined.handle_frame(&[tag], 1),
                Err(ProtocolError::UnexpectedOpcode(_))
            ));
        }
    }

    #[test]
    fn test_unknown_and_empty_frames_are_errors() {
        let mut s = spawned("alice");
        assert_eq!(
            s.handle_frame(&[0x42, 1], 1),
            Err(ProtocolError::UnknownOpcode(0x42))
        );
        assert_eq!(s.handle_frame(&[], 1), Err(ProtocolError::EmptyFrame));
    }

    // -- Spawned behavior -------------------------------------------------

    #[test]
    fn test_move_overwrites_id_and_bits() {
        let mut s = spawned("alice");
        let frame = ClientFrame::Move {
            id: "client-chosen".into(),
            movement: 0b1011,
        }
        .encode()
        .unwrap();
        assert_eq!(s.handle_frame(&frame, 1).unwrap(), Reaction::Updated);
        assert_eq!(s.entity().id, "client-chosen");
        assert_eq!(s.entity().movement, 0b1011);
    }

    #[test]
    fn test_ping_is_echoed_verbatim_as_ping() {
        let mut s = spawned("alice");
        let ping = vec![5, 0xAA, 0xBB, 0xCC];
        assert_eq!(s.handle_frame(&ping, 1).unwrap(), Reaction::Reply(ping.clone()));
    }

    #[test]
    fn test_say_is_relayed_verbatim() {
        let mut s = spawned("alice");
        let say = vec![3, 0x00, 0x02, b'y', b'o'];
        assert_eq!(s.handle_frame(&say, 1).unwrap(), Reaction::Relay(say.clone()));
    }

    #[test]
    fn test_handle_decoded_frame_applies_gating() {
        let mut s = Session::new("id-1");
        let reaction = s.handle(ClientFrame::Ping(vec![5]), 1).unwrap();
        assert_eq!(reaction, Reaction::Ignored);
    }

    #[test]
    fn test_unix_millis_is_after_2020() {
        assert!(unix_millis() > 1_577_836_800_000);
    }
}
