//! The connection registry: tracks every live connection and the player it
//! speaks for.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` pair with no locking. It is
//! owned by the coordinator task and only ever touched from there.

use std::collections::HashMap;

use bingo_relay_protocol::{PlayerId, Recipient, RoomCode, ServerMessage};
use bingo_relay_transport::ConnectionId;
use tracing::{debug, warn};

use crate::{Binding, OutboundSender, Session, SessionError};

/// Outcome of a fan-out. Failures are per recipient and never abort the
/// rest of the delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}

/// Maps connections to outbound channels, and players to connections.
///
/// ## Lifecycle
///
/// ```text
/// attach() ──→ register() ──→ unregister() ──→ detach()
///    │              │                              ▲
///    │              └──────────────────────────────┘
///    ▼                  (disconnect while bound)
/// [anonymous]      [bound to player + room]
/// ```
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<ConnectionId, Session>,
    /// Index from player to the connection that speaks for it. Kept in sync
    /// with `Session::binding`.
    players: HashMap<PlayerId, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a freshly accepted connection.
    ///
    /// # Errors
    /// [`SessionError::AlreadyAttached`] if the id is already tracked.
    pub fn attach(&mut self, conn_id: ConnectionId, sender: OutboundSender) -> Result<(), SessionError> {
        if self.sessions.contains_key(&conn_id) {
            return Err(SessionError::AlreadyAttached(conn_id));
        }
        self.sessions.insert(conn_id, Session::new(conn_id, sender));
        debug!(%conn_id, "connection attached");
        Ok(())
    }

    /// Forgets a connection entirely and returns the binding it held, if
    /// any, so the caller can run the departure path for that player.
    ///
    /// Detaching an unknown connection returns `None`; a second detach is
    /// therefore harmless.
    pub fn detach(&mut self, conn_id: ConnectionId) -> Option<Binding> {
        let session = self.sessions.remove(&conn_id)?;
        let binding = session.binding?;
        if self.players.get(&binding.player_id) == Some(&conn_id) {
            self.players.remove(&binding.player_id);
        }
        debug!(%conn_id, player_id = %binding.player_id, "connection detached");
        Some(binding)
    }

    /// Binds an attached connection to a player in a room.
    ///
    /// # Errors
    /// - [`SessionError::UnknownConnection`]: not attached
    /// - [`SessionError::ConnectionAlreadyBound`]: the connection already
    ///   plays as someone
    /// - [`SessionError::PlayerAlreadyConnected`]: another connection
    ///   already plays as `player_id`
    pub fn register(
        &mut self,
        conn_id: ConnectionId,
        player_id: PlayerId,
        room_code: RoomCode,
    ) -> Result<(), SessionError> {
        self.check_available(conn_id, &player_id)?;

        let session = self
            .sessions
            .get_mut(&conn_id)
            .ok_or(SessionError::UnknownConnection(conn_id))?;
        session.binding = Some(Binding {
            player_id: player_id.clone(),
            room_code,
        });
        self.players.insert(player_id, conn_id);
        Ok(())
    }

    /// Checks that `register(conn_id, player_id, ..)` would succeed without
    /// changing anything.
    ///
    /// # Errors
    /// Same as [`register`](Self::register).
    pub fn check_available(&self, conn_id: ConnectionId, player_id: &PlayerId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&conn_id)
            .ok_or(SessionError::UnknownConnection(conn_id))?;
        if let Some(existing) = &session.binding {
            return Err(SessionError::ConnectionAlreadyBound(existing.player_id.clone()));
        }
        if self.players.contains_key(player_id) {
            return Err(SessionError::PlayerAlreadyConnected(player_id.clone()));
        }
        Ok(())
    }

    /// Drops a player's binding. The connection stays attached and may join
    /// another room.
    ///
    /// Returns the binding that was removed, or `None` if the player was not
    /// registered. `None` is the signal to treat a departure as already
    /// handled.
    pub fn unregister(&mut self, player_id: &PlayerId) -> Option<Binding> {
        let conn_id = self.players.remove(player_id)?;
        self.sessions.get_mut(&conn_id).and_then(|s| s.binding.take())
    }

    /// The connection currently speaking for `player_id`.
    pub fn resolve(&self, player_id: &PlayerId) -> Option<ConnectionId> {
        self.players.get(player_id).copied()
    }

    /// The player and room a connection is bound to.
    pub fn binding(&self, conn_id: ConnectionId) -> Option<&Binding> {
        self.sessions.get(&conn_id).and_then(|s| s.binding.as_ref())
    }

    /// Sends one message to one connection.
    ///
    /// # Errors
    /// - [`SessionError::UnknownConnection`]: not attached
    /// - [`SessionError::SendFailed`]: the connection task has gone away
    pub fn send_to(&self, conn_id: ConnectionId, msg: ServerMessage) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&conn_id)
            .ok_or(SessionError::UnknownConnection(conn_id))?;
        session
            .sender
            .send(msg)
            .map_err(|_| SessionError::SendFailed(conn_id))
    }

    /// Fans a message out to a [`Recipient`].
    ///
    /// Room recipients are every connection currently registered for the
    /// room. A failure to reach one of them is logged and counted, and the
    /// rest still receive the message.
    pub fn deliver(&self, recipient: &Recipient, msg: &ServerMessage) -> Delivery {
        let mut delivery = Delivery::default();

        let targets: Vec<ConnectionId> = match recipient {
            Recipient::Connection(conn_id) => vec![*conn_id],
            Recipient::Room(code) => self.members(code, None),
            Recipient::RoomExcept(code, skip) => self.members(code, Some(skip)),
        };

        for conn_id in targets {
            match self.send_to(conn_id, msg.clone()) {
                Ok(()) => delivery.sent += 1,
                Err(e) => {
                    warn!(%conn_id, kind = msg.kind(), error = %e, "delivery failed");
                    delivery.failed += 1;
                }
            }
        }

        delivery
    }

    fn members(&self, room_code: &RoomCode, skip: Option<&PlayerId>) -> Vec<ConnectionId> {
        self.sessions
            .values()
            .filter(|s| s.is_in(room_code))
            .filter(|s| match (skip, &s.binding) {
                (Some(skip), Some(b)) => &b.player_id != skip,
                _ => true,
            })
            .map(|s| s.conn_id)
            .collect()
    }

    /// Number of attached connections, bound or not.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of connections bound to a player.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `ConnectionRegistry`, named
    //! `test_{function}_{scenario}_{expected}`.
    //!
    //! Outbound channels are plain unbounded mpsc pairs, so none of these
    //! need a runtime: `send` and `try_recv` are synchronous.

    use super::*;
    use tokio::sync::mpsc;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn room(s: &str) -> RoomCode {
        RoomCode::from(s)
    }

    /// Attaches a connection and hands back its receiver.
    fn attach(reg: &mut ConnectionRegistry, n: u64) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        reg.attach(cid(n), tx).expect("attach should succeed");
        rx
    }

    // =====================================================================
    // attach() / detach()
    // =====================================================================

    #[test]
    fn test_attach_twice_returns_already_attached() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);
        let (tx, _rx2) = mpsc::unbounded_channel();

        let result = reg.attach(cid(1), tx);

        assert!(matches!(result, Err(SessionError::AlreadyAttached(c)) if c == cid(1)));
    }

    #[test]
    fn test_detach_bound_connection_returns_binding_and_clears_player() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();

        let binding = reg.detach(cid(1)).expect("should return binding");

        assert_eq!(binding.player_id, pid("a"));
        assert_eq!(binding.room_code, room("ABCD"));
        assert_eq!(reg.resolve(&pid("a")), None);
        assert_eq!(reg.connection_count(), 0);
    }

    #[test]
    fn test_detach_twice_second_is_noop() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();

        assert!(reg.detach(cid(1)).is_some());
        assert!(reg.detach(cid(1)).is_none());
    }

    #[test]
    fn test_detach_anonymous_connection_returns_none() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);

        assert!(reg.detach(cid(1)).is_none());
        assert_eq!(reg.connection_count(), 0);
    }

    // =====================================================================
    // register() / unregister() / resolve()
    // =====================================================================

    #[test]
    fn test_register_then_resolve_returns_connection() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 7);

        reg.register(cid(7), pid("a"), room("ABCD")).unwrap();

        assert_eq!(reg.resolve(&pid("a")), Some(cid(7)));
        assert_eq!(reg.binding(cid(7)).map(|b| &b.room_code), Some(&room("ABCD")));
        assert_eq!(reg.player_count(), 1);
    }

    #[test]
    fn test_register_unknown_connection_returns_error() {
        let mut reg = ConnectionRegistry::new();

        let result = reg.register(cid(9), pid("a"), room("ABCD"));

        assert!(matches!(result, Err(SessionError::UnknownConnection(_))));
    }

    #[test]
    fn test_register_bound_connection_returns_already_bound() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();

        let result = reg.register(cid(1), pid("b"), room("WXYZ"));

        assert!(matches!(result, Err(SessionError::ConnectionAlreadyBound(p)) if p == pid("a")));
        // The original binding is untouched.
        assert_eq!(reg.binding(cid(1)).map(|b| &b.room_code), Some(&room("ABCD")));
    }

    #[test]
    fn test_register_player_on_other_connection_returns_already_connected() {
        let mut reg = ConnectionRegistry::new();
        let _rx1 = attach(&mut reg, 1);
        let _rx2 = attach(&mut reg, 2);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();

        let result = reg.register(cid(2), pid("a"), room("ABCD"));

        assert!(matches!(result, Err(SessionError::PlayerAlreadyConnected(_))));
        assert_eq!(reg.resolve(&pid("a")), Some(cid(1)));
    }

    #[test]
    fn test_unregister_keeps_connection_attached() {
        let mut reg = ConnectionRegistry::new();
        let _rx = attach(&mut reg, 1);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();

        let removed = reg.unregister(&pid("a"));

        assert_eq!(removed.map(|b| b.player_id), Some(pid("a")));
        assert_eq!(reg.resolve(&pid("a")), None);
        assert!(reg.binding(cid(1)).is_none());
        assert_eq!(reg.connection_count(), 1);
        // Free to join somewhere else now.
        reg.register(cid(1), pid("a"), room("WXYZ")).unwrap();
    }

    #[test]
    fn test_unregister_unknown_player_returns_none() {
        let mut reg = ConnectionRegistry::new();

        assert!(reg.unregister(&pid("ghost")).is_none());
    }

    // =====================================================================
    // send_to() / deliver()
    // =====================================================================

    #[test]
    fn test_send_to_closed_receiver_returns_send_failed() {
        let mut reg = ConnectionRegistry::new();
        let rx = attach(&mut reg, 1);
        drop(rx);

        let result = reg.send_to(cid(1), ServerMessage::Pong);

        assert!(matches!(result, Err(SessionError::SendFailed(_))));
    }

    #[test]
    fn test_deliver_room_reaches_only_that_room() {
        let mut reg = ConnectionRegistry::new();
        let mut rx1 = attach(&mut reg, 1);
        let mut rx2 = attach(&mut reg, 2);
        let mut rx3 = attach(&mut reg, 3);
        let mut rx4 = attach(&mut reg, 4);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();
        reg.register(cid(2), pid("b"), room("ABCD")).unwrap();
        reg.register(cid(3), pid("c"), room("WXYZ")).unwrap();
        // cid(4) stays anonymous.

        let delivery = reg.deliver(&Recipient::Room(room("ABCD")), &ServerMessage::Pong);

        assert_eq!(delivery, Delivery { sent: 2, failed: 0 });
        assert_eq!(rx1.try_recv().ok(), Some(ServerMessage::Pong));
        assert_eq!(rx2.try_recv().ok(), Some(ServerMessage::Pong));
        assert!(rx3.try_recv().is_err());
        assert!(rx4.try_recv().is_err());
    }

    #[test]
    fn test_deliver_room_except_skips_one_player() {
        let mut reg = ConnectionRegistry::new();
        let mut rx1 = attach(&mut reg, 1);
        let mut rx2 = attach(&mut reg, 2);
        reg.register(cid(1), pid("a"), room("ABCD")).unwrap();
        reg.register(cid(2), pid("b"), room("ABCD")).unwrap();

        let delivery = reg.deliver(
            &Recipient::RoomExcept(room("ABCD"), pid("b")),
            &ServerMessage::Pong,
        );

        assert_eq!(delivery.sent, 1);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_deliver_one_closed_peer_does_not_block_others() {
        let mut reg = ConnectionRegistry::new();
        let rx1 = attach(&mut reg, 1);
        let mut rx2 = attach(&mut reg, 2);
        let mut rx3 = attach(&mut reg, 3);
        for (n, p) in [(1, "a"), (2, "b"), (3, "c")] {
            reg.register(cid(n), pid(p), room("ABCD")).unwrap();
        }
        drop(rx1);

        let delivery = reg.deliver(&Recipient::Room(room("ABCD")), &ServerMessage::Pong);

        assert_eq!(delivery, Delivery { sent: 2, failed: 1 });
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
    }

    #[test]
    fn test_deliver_connection_reaches_anonymous_connection() {
        let mut reg = ConnectionRegistry::new();
        let mut rx = attach(&mut reg, 1);

        let delivery = reg.deliver(&Recipient::Connection(cid(1)), &ServerMessage::Pong);

        assert_eq!(delivery.sent, 1);
        assert_eq!(rx.try_recv().ok(), Some(ServerMessage::Pong));
    }

    #[test]
    fn test_deliver_unknown_connection_counts_failure() {
        let reg = ConnectionRegistry::new();

        let delivery = reg.deliver(&Recipient::Connection(cid(5)), &ServerMessage::Pong);

        assert_eq!(delivery, Delivery { sent: 0, failed: 1 });
    }
}
