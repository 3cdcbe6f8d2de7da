//! Error types for the session layer.

use bingo_relay_protocol::PlayerId;
use bingo_relay_transport::ConnectionId;

/// Errors raised by the [`ConnectionRegistry`](crate::ConnectionRegistry).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection was never attached, or has already been detached.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// `attach` was called twice for the same connection.
    #[error("connection {0} is already attached")]
    AlreadyAttached(ConnectionId),

    /// The connection already speaks for a player. It must leave first.
    #[error("connection is already playing as {0}")]
    ConnectionAlreadyBound(PlayerId),

    /// Another live connection already speaks for this player id.
    #[error("player {0} is already connected")]
    PlayerAlreadyConnected(PlayerId),

    /// The connection's outbound receiver is gone.
    #[error("send to {0} failed: receiver closed")]
    SendFailed(ConnectionId),
}
