//! Per-connection handler: pumps frames between one socket and the
//! coordinator.
//!
//! Each accepted TCP connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Finish the WebSocket upgrade, bounded by the handshake timeout
//!   2. Register an outbound queue with the coordinator (it greets the client)
//!   3. Loop: forward inbound text, write queued outbound events, ping the
//!      client every heartbeat interval
//!   4. On close, error, or a socket that stopped answering pings: tell the
//!      coordinator, which runs the same departure path as `leave_room`
//!
//! A quiet player is never dropped for being quiet. Any inbound frame,
//! including the pong a browser sends back on its own, keeps the
//! connection alive.

use bingo_relay_protocol::{Codec, JsonCodec};
use bingo_relay_transport::{
    Connection, ConnectionId, Handshake, Inbound, PendingWebSocket, TransportError,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout, timeout_at};

use crate::coordinator::CoordinatorHandle;
use crate::{BingoError, Heartbeat};

/// Drop guard that reports the disconnect when the handler exits.
///
/// This ensures cleanup happens even if the handler returns early with an
/// error. Since `Drop` is synchronous, we spawn a fire-and-forget task to
/// post the event.
struct DisconnectGuard {
    conn_id: ConnectionId,
    coordinator: CoordinatorHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            let _ = coordinator.disconnected(conn_id).await;
        });
    }
}

/// Handles a single client from TCP accept to close.
pub(crate) async fn handle_connection(
    pending: PendingWebSocket,
    coordinator: CoordinatorHandle,
    heartbeat: Heartbeat,
) -> Result<(), BingoError> {
    let conn_id = pending.id();
    let peer = pending.peer_addr();

    let conn = match timeout(heartbeat.handshake_timeout, pending.complete()).await {
        Ok(upgraded) => upgraded?,
        Err(_) => {
            tracing::debug!(%conn_id, %peer, "handshake timed out, dropping socket");
            return Err(TransportError::HandshakeTimedOut(heartbeat.handshake_timeout).into());
        }
    };
    tracing::debug!(%conn_id, %peer, "handling new connection");

    let codec = JsonCodec;
    let (tx, mut outbound) = mpsc::unbounded_channel();
    coordinator.connected(conn_id, tx).await?;
    let _guard = DisconnectGuard {
        conn_id,
        coordinator: coordinator.clone(),
    };

    let mut deadline = Instant::now() + heartbeat.timeout;
    let mut pings = interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    pings.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            inbound = timeout_at(deadline, conn.recv()) => match inbound {
                Ok(Ok(Some(frame))) => {
                    deadline = Instant::now() + heartbeat.timeout;
                    if let Inbound::Text(text) = frame {
                        if let Err(e) = coordinator.inbound(conn_id, text).await {
                            break Err(e);
                        }
                    }
                }
                Ok(Ok(None)) => {
                    tracing::info!(%conn_id, "connection closed cleanly");
                    break Ok(());
                }
                Ok(Err(e)) => {
                    tracing::debug!(%conn_id, error = %e, "recv error");
                    break Err(e.into());
                }
                Err(_) => {
                    tracing::info!(%conn_id, silent_for = ?heartbeat.timeout, "no answer to pings, closing");
                    break Ok(());
                }
            },
            _ = pings.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%conn_id, error = %e, "ping failed");
                    break Err(e.into());
                }
            },
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let text = codec.encode(&msg)?;
                    if let Err(e) = conn.send(&text).await {
                        tracing::debug!(%conn_id, error = %e, "send error");
                        break Err(e.into());
                    }
                }
                // The coordinator dropped our queue: it is shutting down.
                None => break Ok(()),
            },
        }
    };

    let _ = conn.close().await;
    // _guard drops here → coordinator runs the departure path.
    result
}
