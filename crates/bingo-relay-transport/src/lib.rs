//! Client channels for the bingo relay.
//!
//! Every player talks to the relay over one long-lived channel that carries
//! JSON text frames in both directions. This crate hides the socket behind
//! three small traits so the rest of the relay only deals in frames:
//!
//! ```text
//! Transport::accept ──→ Handshake::complete ──→ Connection (send / recv / ping)
//!   (TCP only)            (per-client task)
//! ```
//!
//! The listener hands out a [`Handshake`] as soon as the TCP connection
//! exists, and the caller finishes the upgrade in the client's own task.
//! `accept` never waits on a peer's upgrade request.
//!
//! Besides text, [`Connection::recv`] reports control traffic as
//! [`Inbound::Heartbeat`], so a player who is connected but quiet can be
//! told apart from a dead socket.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket channel via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingWebSocket, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Identifies one client channel for as long as it is open.
///
/// Ids are handed out at TCP accept time, before the upgrade, so a stalled
/// handshake can already be named in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One thing a client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame. Binary frames holding UTF-8 arrive here too.
    Text(String),
    /// A ping or pong control frame: the peer is alive but said nothing.
    Heartbeat,
}

/// Listens for new clients.
pub trait Transport: Send + Sync + 'static {
    /// A client whose channel is not yet usable.
    type Pending: Handshake<Connection = Self::Connection, Error = Self::Error>;
    /// The channel a finished handshake yields.
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client to connect at the socket level.
    ///
    /// Never waits on a client's handshake.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Stops taking new clients.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A connected client that still has to finish the protocol upgrade.
///
/// Dropping it closes the socket.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    fn id(&self) -> ConnectionId;

    /// Runs the upgrade. Callers bound this with a timeout.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// An open, text-framed channel to one client.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Waits for the next text or control frame.
    ///
    /// Returns `Ok(None)` once the client has closed the channel.
    async fn recv(&self) -> Result<Option<Inbound>, Self::Error>;

    /// Sends a liveness ping. A live client answers with a pong, which
    /// shows up in [`recv`](Self::recv) as [`Inbound::Heartbeat`].
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Closes the channel.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
        assert_eq!(id.into_inner(), 7);
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
        assert_ne!(ConnectionId::new(1), ConnectionId::new(2));
    }
}
