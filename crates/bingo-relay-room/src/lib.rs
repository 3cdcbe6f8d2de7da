//! Room lifecycle for the bingo relay.
//!
//! A room is a plain aggregate ([`Room`]) kept in a [`RoomStore`]. The store
//! is the only thing allowed to mutate rooms, and it owns the per-room turn
//! timers so that every operation that changes the current caller also
//! re-arms or cancels that room's countdown in the same step.
//!
//! # Key types
//!
//! - [`RoomStore`]: create/join/leave/start/call/skip/win, plus timer expiry
//! - [`Room`]: players in turn order, host, called/available numbers
//! - [`RoomSettings`] / [`RoomPhase`]: immutable settings and lifecycle
//! - [`card`]: dealing and validating bingo cards

pub mod card;
mod config;
mod error;
mod room;
mod store;

pub use bingo_relay_timer::Expired;
pub use config::{RoomPhase, RoomSettings};
pub use error::RoomError;
pub use room::{Room, Winner};
pub use store::{CallOutcome, CallerChange, Removal, RoomStore, TurnAdvance};
