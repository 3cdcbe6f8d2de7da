//! Error types for the room layer.
//!
//! The display strings are shown to players as-is, so they read as
//! sentences rather than log lines.

use bingo_relay_protocol::{PlayerId, RoomCode};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("Room not found. Please check the room code.")]
    RoomNotFound(RoomCode),

    /// A room with this code already exists.
    #[error("Room already exists. Please choose a different room code.")]
    DuplicateRoom(RoomCode),

    /// Another player in the room already uses this display name.
    #[error("A player named \"{0}\" is already in this room. Please choose a different name.")]
    DuplicateName(String),

    /// The number was called earlier in this game.
    #[error("Number {0} has already been called.")]
    NumberAlreadyCalled(u32),

    /// The number is not on an N×N card at all.
    #[error("Number {0} is outside 1..={1}.")]
    NumberOutOfRange(u32, u32),

    /// The player id is already a member of the room.
    #[error("Player {0} is already in this room.")]
    AlreadyInRoom(PlayerId),

    /// The player id is not a member of the room.
    #[error("Player {0} is not in this room.")]
    NotInRoom(PlayerId),

    /// A supplied bingo card is not a permutation of 1..=N².
    #[error("Invalid bingo card: {0}")]
    InvalidCard(String),

    /// The room's phase does not allow this operation, e.g. calling a
    /// number before the game started.
    #[error("Not allowed right now: {0}")]
    InvalidState(String),
}
