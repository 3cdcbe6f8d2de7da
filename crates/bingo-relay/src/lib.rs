//! # Bingo relay
//!
//! Real-time multiplayer bingo over WebSockets.
//!
//! Clients create and join rooms, take turns calling numbers, and claim
//! wins. The relay keeps every member's view of a room consistent: it owns
//! the rooms, the turn order and the per-turn countdowns, and fans each
//! state change out to the room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bingo_relay::prelude::*;
//!
//! # async fn start() -> Result<(), BingoError> {
//! let server = BingoServer::builder()
//!     .bind("127.0.0.1:8080")
//!     .build()
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod handler;
mod router;
mod server;

pub use config::{Cli, GameLimits, Heartbeat, ServerConfig};
pub use coordinator::{
    CoordinatorEvent, CoordinatorHandle, SessionCoordinator, WELCOME, spawn_coordinator,
};
pub use error::{BingoError, RequestError};
pub use router::Outbound;
pub use server::{BingoServer, BingoServerBuilder};

/// Everything needed to run or embed the relay.
pub mod prelude {
    pub use crate::{
        BingoError, BingoServer, BingoServerBuilder, CoordinatorEvent, GameLimits, Heartbeat,
        RequestError, ServerConfig, SessionCoordinator,
    };
    pub use bingo_relay_protocol::{
        ClientMessage, ErrorCode, Player, PlayerId, RoomCode, ServerMessage, WinningCriteria,
    };
}
