//! The session registry: every live connection, its session, and its
//! outbound queue.
//!
//! The registry owns three things per connection:
//!
//! - the [`Session`] (entity + spawned flag)
//! - the sending half of that connection's outbound channel
//! - the last UPDATE frame actually queued to it
//!
//! Keeping the last UPDATE inside the same entry means it disappears
//! together with the connection; a reused slot can never inherit a stale
//! cache.
//!
//! # Concurrency note
//!
//! Like the session layer everywhere else in this workspace, `SessionRegistry`
//! is a plain single-owner struct. The world actor owns it and is the only
//! task that ever touches it.

use std::collections::BTreeMap;

use synchro_protocol::{EntityState, ServerFrame, encode_update};
use synchro_transport::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::{Reaction, Session, SessionError};

/// The sending half of a connection's outbound frame queue.
pub type Outbound = mpsc::UnboundedSender<Vec<u8>>;

/// Counters from one broadcast cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Spawned entities in the frame.
    pub entities: usize,
    /// Connections the frame was queued to.
    pub sent: usize,
    /// Connections skipped because they already have these exact bytes.
    pub suppressed: usize,
}

struct Peer {
    session: Session,
    outbound: Outbound,
    last_update: Option<Vec<u8>>,
}

impl Peer {
    /// Queues a frame. A closed queue means the connection is on its way
    /// out; its removal will follow, so the frame is simply dropped.
    fn push(&self, conn_id: ConnectionId, bytes: Vec<u8>) -> bool {
        if self.outbound.send(bytes).is_err() {
            debug!(%conn_id, "outbound queue closed, frame dropped");
            return false;
        }
        true
    }
}

/// All live sessions, keyed and ordered by connection id.
///
/// `BTreeMap` rather than `HashMap`: ids are allocated in acceptance order,
/// so iterating the map gives a stable, acceptance-ordered roster for
/// UPDATE frames.
#[derive(Default)]
pub struct SessionRegistry {
    peers: BTreeMap<ConnectionId, Peer>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection with a fresh unspawned session and returns the
    /// generated entity id.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if `conn_id` is already present.
    pub fn register(
        &mut self,
        conn_id: ConnectionId,
        outbound: Outbound,
    ) -> Result<String, SessionError> {
        if self.peers.contains_key(&conn_id) {
            return Err(SessionError::AlreadyRegistered(conn_id));
        }
        let session = Session::with_random_id();
        let entity_id = session.entity().id.clone();
        self.peers.insert(
            conn_id,
            Peer {
                session,
                outbound,
                last_update: None,
            },
        );
        debug!(%conn_id, %entity_id, "session registered");
        Ok(entity_id)
    }

    /// Runs one inbound frame through the connection's session and
    /// delivers whatever it produced.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] for an unknown connection
    /// - [`SessionError::Protocol`] for a malformed frame (nothing is sent)
    pub fn handle_frame(
        &mut self,
        conn_id: ConnectionId,
        data: &[u8],
        now_ms: u64,
    ) -> Result<(), SessionError> {
        let peer = self
            .peers
            .get_mut(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;

        match peer.session.handle_frame(data, now_ms)? {
            Reaction::Ignored | Reaction::Updated => {}
            Reaction::Reply(bytes) => {
                peer.push(conn_id, bytes);
            }
            Reaction::Relay(bytes) => {
                let recipients = self.relay(&bytes);
                trace!(%conn_id, recipients, "frame relayed");
            }
        }
        Ok(())
    }

    /// Removes a connection. If its session was spawned, every remaining
    /// connection (spawned or not) is told with a LEAVE frame.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if the connection is not registered,
    /// which also makes a second removal harmless.
    pub fn remove(&mut self, conn_id: ConnectionId) -> Result<Session, SessionError> {
        let peer = self
            .peers
            .remove(&conn_id)
            .ok_or(SessionError::NotFound(conn_id))?;
        let session = peer.session;

        if session.is_spawned() {
            let entity = session.entity();
            let leave = ServerFrame::Leave {
                id: entity.id.clone(),
            }
            .encode()?;
            for (&id, other) in &self.peers {
                other.push(id, leave.clone());
            }
            info!(
                %conn_id,
                entity_id = %entity.id,
                username = %entity.username,
                recipients = self.peers.len(),
                "left"
            );
        } else {
            debug!(%conn_id, "unspawned session removed");
        }
        Ok(session)
    }

    /// Builds one UPDATE frame from every spawned entity (in connection
    /// order) and queues it to each live connection whose last UPDATE
    /// differs from it byte for byte.
    pub fn broadcast_update(&mut self) -> Result<BroadcastStats, SessionError> {
        let entities = self.entities();
        let frame = encode_update(&entities)?;
        let mut stats = BroadcastStats {
            entities: entities.len(),
            ..Default::default()
        };

        for (&conn_id, peer) in &mut self.peers {
            if peer.last_update.as_deref() == Some(frame.as_slice()) {
                stats.suppressed += 1;
                continue;
            }
            if peer.push(conn_id, frame.clone()) {
                peer.last_update = Some(frame.clone());
                stats.sent += 1;
            }
        }

        trace!(
            entities = stats.entities,
            sent = stats.sent,
            suppressed = stats.suppressed,
            "update broadcast"
        );
        Ok(stats)
    }

    /// Snapshot of every spawned entity, in connection order.
    pub fn entities(&self) -> Vec<EntityState> {
        self.peers
            .values()
            .filter(|p| p.session.is_spawned())
            .map(|p| p.session.entity().clone())
            .collect()
    }

    pub fn session(&self, conn_id: ConnectionId) -> Option<&Session> {
        self.peers.get(&conn_id).map(|p| &p.session)
    }

    pub fn contains(&self, conn_id: ConnectionId) -> bool {
        self.peers.contains_key(&conn_id)
    }

    /// Number of live connections, spawned or not.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn spawned_count(&self) -> usize {
        self.peers.values().filter(|p| p.session.is_spawned()).count()
    }

    /// Queues `bytes` to every spawned connection. Returns how many got it.
    fn relay(&self, bytes: &[u8]) -> usize {
        self.peers
            .iter()
            .filter(|(_, p)| p.session.is_spawned())
            .filter(|&(&id, p)| p.push(id, bytes.to_vec()))
            .count()
    }
}
