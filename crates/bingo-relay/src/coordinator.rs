//! The session coordinator: a single task that owns every room, every
//! connection binding and every turn timer.
//!
//! Connection tasks and turn timers never touch game state. They post
//! events; the coordinator applies them one at a time:
//!
//! ```text
//! connection tasks ──CoordinatorEvent──┐
//!                                      ├──→ SessionCoordinator ──→ outbound queues
//! turn timers ───────Expired───────────┘
//! ```
//!
//! Because nothing else mutates state, races such as a disconnect landing
//! while a turn expires reduce to "which event was queued first", and each
//! handler re-validates what it needs before acting.

use std::time::Duration;

use bingo_relay_protocol::{
    Codec, JsonCodec, Recipient, RoomCode, ServerMessage, SkipReason, now_millis,
};
use bingo_relay_room::{Expired, RoomStore};
use bingo_relay_session::{ConnectionRegistry, OutboundSender};
use bingo_relay_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::router::{self, Outbound};
use crate::{BingoError, GameLimits, RequestError};

/// Greeting sent to every new connection.
pub const WELCOME: &str = "Connected to Bingo server";

// ---------------------------------------------------------------------------
// Events and handle
// ---------------------------------------------------------------------------

/// What a connection task can tell the coordinator.
#[derive(Debug)]
pub enum CoordinatorEvent {
    /// A connection was accepted; `sender` is its outbound queue.
    Connected {
        conn_id: ConnectionId,
        sender: OutboundSender,
    },
    /// A text frame arrived.
    Inbound { conn_id: ConnectionId, text: String },
    /// The connection closed, errored or stopped answering pings.
    Disconnected { conn_id: ConnectionId },
}

/// Cloneable sender half used by connection tasks.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    /// # Errors
    /// [`BingoError::CoordinatorGone`] if the coordinator has stopped.
    pub async fn connected(&self, conn_id: ConnectionId, sender: OutboundSender) -> Result<(), BingoError> {
        self.send(CoordinatorEvent::Connected { conn_id, sender }).await
    }

    /// # Errors
    /// [`BingoError::CoordinatorGone`] if the coordinator has stopped.
    pub async fn inbound(&self, conn_id: ConnectionId, text: String) -> Result<(), BingoError> {
        self.send(CoordinatorEvent::Inbound { conn_id, text }).await
    }

    /// # Errors
    /// [`BingoError::CoordinatorGone`] if the coordinator has stopped.
    pub async fn disconnected(&self, conn_id: ConnectionId) -> Result<(), BingoError> {
        self.send(CoordinatorEvent::Disconnected { conn_id }).await
    }

    async fn send(&self, event: CoordinatorEvent) -> Result<(), BingoError> {
        self.tx.send(event).await.map_err(|_| BingoError::CoordinatorGone)
    }
}

/// Starts a coordinator task and returns the handle to reach it.
///
/// The task ends once every [`CoordinatorHandle`] has been dropped.
pub fn spawn_coordinator(
    limits: GameLimits,
    capacity: usize,
    stats_interval: Duration,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (coordinator, expiries) = SessionCoordinator::new(limits);
    let task = tokio::spawn(coordinator.run(rx, expiries, stats_interval));
    (CoordinatorHandle { tx }, task)
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns all shared game state. See the module docs.
///
/// Every method is synchronous: outbound delivery goes through unbounded
/// per-connection queues and never waits. Multiple coordinators can coexist,
/// which is how the tests drive one directly without a server.
pub struct SessionCoordinator {
    pub(crate) rooms: RoomStore,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) limits: GameLimits,
    codec: JsonCodec,
}

impl SessionCoordinator {
    /// Creates a coordinator and the receiver its turn timers report on.
    ///
    /// Everything arriving on the receiver must be passed to
    /// [`handle_expiry`](Self::handle_expiry).
    pub fn new(limits: GameLimits) -> (Self, mpsc::UnboundedReceiver<Expired<RoomCode>>) {
        let (rooms, expiries) = RoomStore::new();
        let coordinator = Self {
            rooms,
            registry: ConnectionRegistry::new(),
            limits: limits.validated(),
            codec: JsonCodec,
        };
        (coordinator, expiries)
    }

    /// Event loop. Runs until the event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<CoordinatorEvent>,
        mut expiries: mpsc::UnboundedReceiver<Expired<RoomCode>>,
        stats_interval: Duration,
    ) {
        let mut stats = tokio::time::interval(stats_interval.max(Duration::from_secs(1)));
        stats.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        stats.tick().await;

        info!("coordinator running");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(expired) = expiries.recv() => self.handle_expiry(expired),
                _ = stats.tick() => self.log_stats(),
            }
        }
        info!(rooms = self.rooms.len(), "coordinator stopped");
    }

    /// Applies one connection event.
    pub fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Connected { conn_id, sender } => {
                if let Err(e) = self.registry.attach(conn_id, sender) {
                    warn!(%conn_id, error = %e, "duplicate connect ignored");
                    return;
                }
                let welcome = ServerMessage::Connected {
                    message: WELCOME.to_string(),
                };
                self.dispatch(vec![(Recipient::Connection(conn_id), welcome)]);
            }
            CoordinatorEvent::Inbound { conn_id, text } => self.handle_inbound(conn_id, &text),
            CoordinatorEvent::Disconnected { conn_id } => {
                let Some(binding) = self.registry.detach(conn_id) else {
                    debug!(%conn_id, "anonymous connection closed");
                    return;
                };
                info!(%conn_id, player_id = %binding.player_id, room_code = %binding.room_code, "player disconnected");
                let out = router::depart(self, binding);
                self.dispatch(out);
            }
        }
    }

    /// Applies a turn timer expiry. Stale expiries change nothing.
    pub fn handle_expiry(&mut self, expired: Expired<RoomCode>) {
        let Some(advance) = self.rooms.expire_turn(&expired) else {
            return;
        };
        self.dispatch(vec![(
            Recipient::Room(expired.key),
            ServerMessage::TurnSkipped {
                skipped: advance.skipped,
                next_caller: advance.next_caller,
                reason: SkipReason::Timeout,
                skipped_at: now_millis(),
            },
        )]);
    }

    fn handle_inbound(&mut self, conn_id: ConnectionId, text: &str) {
        let result = self
            .codec
            .decode_client(text)
            .map_err(RequestError::from)
            .and_then(|msg| {
                debug!(%conn_id, kind = msg.kind(), "inbound");
                router::route(self, conn_id, msg)
            });

        match result {
            Ok(out) => self.dispatch(out),
            Err(e) => {
                debug!(%conn_id, code = ?e.code(), error = %e, "request refused");
                let reply = ServerMessage::Error {
                    code: e.code(),
                    message: e.to_string(),
                };
                self.dispatch(vec![(Recipient::Connection(conn_id), reply)]);
            }
        }
    }

    /// Fans out events. A failed recipient is logged inside the registry
    /// and never stops the rest.
    fn dispatch(&self, out: Vec<Outbound>) {
        for (recipient, msg) in out {
            let delivery = self.registry.deliver(&recipient, &msg);
            if matches!(recipient, Recipient::Connection(_)) {
                continue;
            }
            debug!(
                kind = msg.kind(),
                sent = delivery.sent,
                failed = delivery.failed,
                "broadcast"
            );
        }
    }

    fn log_stats(&self) {
        info!(
            rooms = self.rooms.len(),
            players = self.rooms.player_count(),
            connections = self.registry.connection_count(),
            armed_timers = self.rooms.armed_timers(),
            "server stats"
        );
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Read access to the room store, mostly for tests and stats.
    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    /// Read access to the connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}
