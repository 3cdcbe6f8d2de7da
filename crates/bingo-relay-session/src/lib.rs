//! Connection registry for the bingo relay.
//!
//! Every live connection gets an outbound channel when it is accepted. Once
//! it creates or joins a room, the connection is bound to exactly one
//! player in exactly one room. The registry answers the two questions the
//! router keeps asking:
//!
//! 1. **Where does this player's traffic go?** ([`ConnectionRegistry::resolve`])
//! 2. **Which player sent this frame?** ([`ConnectionRegistry::binding`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← owns the registry, routes events through it
//!     ↕
//! Session Layer (this crate)  ← connection ↔ player ↔ room bookkeeping
//!     ↕
//! Protocol / Transport (below)  ← PlayerId, RoomCode, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::{ConnectionRegistry, Delivery};
pub use session::{Binding, OutboundSender, Session};
