//! Per-connection records kept by the registry.

use bingo_relay_protocol::{PlayerId, RoomCode, ServerMessage};
use bingo_relay_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's outbound queue.
///
/// The connection task owns the receiver and writes whatever arrives to the
/// socket. Unbounded so that a broadcast never waits on a slow peer.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Which player a connection speaks for, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub player_id: PlayerId,
    pub room_code: RoomCode,
}

/// A live connection as seen by the registry.
#[derive(Debug)]
pub struct Session {
    pub conn_id: ConnectionId,
    pub sender: OutboundSender,
    /// `None` until the connection creates or joins a room.
    pub binding: Option<Binding>,
}

impl Session {
    pub fn new(conn_id: ConnectionId, sender: OutboundSender) -> Self {
        Self {
            conn_id,
            sender,
            binding: None,
        }
    }

    /// Whether this connection is registered for `room_code`.
    pub fn is_in(&self, room_code: &RoomCode) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| &b.room_code == room_code)
    }
}
