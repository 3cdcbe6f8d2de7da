//! Error types for the relay.

use bingo_relay_protocol::{ErrorCode, ProtocolError};
use bingo_relay_room::RoomError;
use bingo_relay_session::SessionError;
use bingo_relay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The coordinator task has stopped.
    #[error("coordinator is not running")]
    CoordinatorGone,
}

/// Why a single client request was refused.
///
/// Always reported to the requesting connection alone, as an `error`
/// event. Never closes the connection.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Malformed frame, missing or ill-typed fields, or a request that
    /// makes no sense for this connection.
    #[error("{0}")]
    BadRequest(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),
}

impl RequestError {
    /// The wire category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Room(RoomError::RoomNotFound(_)) => ErrorCode::RoomNotFound,
            Self::Room(RoomError::DuplicateRoom(_)) => ErrorCode::DuplicateRoom,
            Self::Room(RoomError::DuplicateName(_)) => ErrorCode::DuplicateName,
            Self::Room(RoomError::NumberAlreadyCalled(_)) => ErrorCode::NumberAlreadyCalled,
            Self::Room(_) | Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::UnknownMessageType(_) => ErrorCode::UnknownMessageType,
        }
    }
}

impl From<ProtocolError> for RequestError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownType(kind) => Self::UnknownMessageType(kind),
            other => Self::BadRequest(format!("Invalid message format: {other}")),
        }
    }
}

impl From<SessionError> for RequestError {
    fn from(err: SessionError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
