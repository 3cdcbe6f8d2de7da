//! Wire protocol for the bingo relay.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Player`], etc.):
//!   the JSON objects that travel on the wire, each tagged by `type`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from text frames.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! ```text
//! Transport (text) → Protocol (ClientMessage) → Coordinator (rooms, turns)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CallerChangeReason, ClientMessage, ErrorCode, Player, PlayerId, Recipient, RoomCode,
    RoomInfo, ServerMessage, SkipReason, WinningCriteria, now_millis,
};
