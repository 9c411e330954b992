//! Transport abstraction layer for Synchro.
//!
//! Provides the [`Transport`] and [`Connection`] traits. Everything above
//! this crate only sees opaque binary frames going in and out of a
//! connection; how they travel (WebSocket today) is decided here.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
///
/// Ids are handed out from a monotonically increasing counter, so ordering
/// ids gives acceptance order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// An accepted socket that still has to complete its handshake.
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Waits for the next incoming socket.
    ///
    /// Returns as soon as the socket is accepted. The protocol handshake
    /// is left to [`Handshake::complete`], so a peer that never finishes
    /// it cannot hold up the next `accept`.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// The address the transport is actually listening on (useful after
    /// binding to port 0).
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// The second half of accepting a connection.
///
/// Callers usually run [`complete`](Self::complete) in the connection's own
/// task, under a timeout.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Address of the remote end.
    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake and yields the ready connection.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// A single connection that can send and receive binary frames.
///
/// `send` and `recv` may be called concurrently from different tasks: a
/// pending `recv` never blocks a `send`.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_by_value() {
        let mut ids = vec![ConnectionId::new(3), ConnectionId::new(1), ConnectionId::new(2)];
        ids.sort();
        assert_eq!(
            ids,
            vec![ConnectionId::new(1), ConnectionId::new(2), ConnectionId::new(3)]
        );
    }

    #[test]
    fn test_connection_id_works_as_btree_key() {
        use std::collections::BTreeMap;
        let mut map = BTreeMap::new();
        map.insert(ConnectionId::new(2), "bob");
        map.insert(ConnectionId::new(1), "alice");
        assert_eq!(map.values().copied().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }
}
