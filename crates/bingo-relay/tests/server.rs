//! Integration tests for the relay server, handler, and full connection flow.

use std::time::Duration;

use bingo_relay::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(BingoServer::builder()).await
}

async fn start_server_with(builder: BingoServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// Short enough that dead sockets are noticed within a test.
fn fast_heartbeat() -> Heartbeat {
    Heartbeat {
        handshake_timeout: Duration::from_millis(200),
        interval: Duration::from_millis(100),
        timeout: Duration::from_millis(300),
    }
}

/// Connects and consumes the greeting.
async fn connect(addr: &str) -> ClientWs {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match recv(&mut ws).await {
        ServerMessage::Connected { message } => assert_eq!(message, bingo_relay::WELCOME),
        other => panic!("expected connected, got {other:?}"),
    }
    ws
}

async fn send(ws: &mut ClientWs, frame: Value) {
    ws.send(Message::text(frame.to_string()))
        .await
        .expect("send frame");
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("server should answer")
            .expect("stream open")
            .expect("frame ok");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("decode server message");
        }
    }
}

fn create_frame(id: &str, name: &str) -> Value {
    json!({
        "type": "create_room",
        "roomCode": "ABCD",
        "playerName": name,
        "playerId": id,
        "matrixSize": 3,
        "bingoCard": [9, 8, 7, 6, 5, 4, 3, 2, 1],
        "winningCriteria": "all-lines"
    })
}

fn join_frame(id: &str, name: &str) -> Value {
    json!({
        "type": "join_room",
        "roomCode": "ABCD",
        "playerName": name,
        "playerId": id
    })
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_ping_pong() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "ping"})).await;

    assert_eq!(recv(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn test_create_and_join_room() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;

    send(&mut alice, create_frame("alice", "Alice")).await;
    match recv(&mut alice).await {
        ServerMessage::RoomJoined {
            room_code,
            bingo_card,
            room_info,
            ..
        } => {
            assert_eq!(room_code, RoomCode::from("ABCD"));
            assert_eq!(bingo_card, vec![9, 8, 7, 6, 5, 4, 3, 2, 1]);
            assert_eq!(room_info.winning_criteria, WinningCriteria::AllLines);
            assert_eq!(room_info.turn_time_limit, 30);
        }
        other => panic!("expected room_joined, got {other:?}"),
    }

    send(&mut bob, join_frame("bob", "Bob")).await;
    match recv(&mut bob).await {
        ServerMessage::RoomJoined { players, .. } => assert_eq!(players.len(), 2),
        other => panic!("expected room_joined, got {other:?}"),
    }
    match recv(&mut alice).await {
        ServerMessage::PlayerJoined { new_player, .. } => {
            assert_eq!(new_player.id, PlayerId::from("bob"));
        }
        other => panic!("expected player_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_room_not_found() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, join_frame("bob", "Bob")).await;

    match recv(&mut ws).await {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, ErrorCode::RoomNotFound);
            assert!(message.contains("Room not found"));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_garbage_frame_does_not_close_connection() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("not json")).await.expect("send");
    match recv(&mut ws).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::BadRequest),
        other => panic!("expected error, got {other:?}"),
    }

    send(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn test_socket_close_removes_player() {
    let addr = start_server().await;
    let mut alice = connect(&addr).await;
    let mut bob = connect(&addr).await;
    send(&mut alice, create_frame("alice", "Alice")).await;
    recv(&mut alice).await;
    send(&mut bob, join_frame("bob", "Bob")).await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    bob.close(None).await.expect("close");

    match recv(&mut alice).await {
        ServerMessage::PlayerLeft {
            players,
            left_player,
            new_host,
        } => {
            assert_eq!(left_player.id, PlayerId::from("bob"));
            assert_eq!(players.len(), 1);
            assert_eq!(new_host, Some(PlayerId::from("alice")));
        }
        other => panic!("expected player_left, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unresponsive_socket_is_closed() {
    let addr = start_server_with(BingoServer::builder().heartbeat(fast_heartbeat())).await;
    let mut ws = connect(&addr).await;

    // Not reading means the client never answers the server's pings.
    tokio::time::sleep(Duration::from_millis(600)).await;

    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("server should close the dead socket");
        match next {
            Some(Ok(Message::Ping(_))) => continue,
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            other => panic!("expected close, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_quiet_member_kept_alive_by_pongs() {
    let addr = start_server_with(BingoServer::builder().heartbeat(fast_heartbeat())).await;
    let mut alice = connect(&addr).await;
    send(&mut alice, create_frame("alice", "Alice")).await;
    recv(&mut alice).await;

    // Keep reading, which lets tungstenite answer pings, but send no text
    // for three times the liveness timeout.
    let until = tokio::time::Instant::now() + Duration::from_millis(900);
    while tokio::time::Instant::now() < until {
        match tokio::time::timeout(Duration::from_millis(50), alice.next()).await {
            Err(_) | Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            other => panic!("quiet member should stay connected, got {other:?}"),
        }
    }

    let mut bob = connect(&addr).await;
    send(&mut bob, join_frame("bob", "Bob")).await;
    match recv(&mut bob).await {
        ServerMessage::RoomJoined { players, .. } => assert_eq!(players.len(), 2),
        other => panic!("expected room_joined, got {other:?}"),
    }
    assert!(matches!(recv(&mut alice).await, ServerMessage::PlayerJoined { .. }));
}

#[tokio::test]
async fn test_client_pings_count_as_activity() {
    let addr = start_server_with(BingoServer::builder().heartbeat(fast_heartbeat())).await;
    let mut alice = connect(&addr).await;
    send(&mut alice, create_frame("alice", "Alice")).await;
    recv(&mut alice).await;

    for _ in 0..6 {
        alice
            .send(Message::Ping(Default::default()))
            .await
            .expect("send ping");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let mut bob = connect(&addr).await;
    send(&mut bob, join_frame("bob", "Bob")).await;
    match recv(&mut bob).await {
        ServerMessage::RoomJoined { room_code, .. } => assert_eq!(room_code, RoomCode::from("ABCD")),
        other => panic!("room should still exist, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stalled_handshake_does_not_block_other_clients() {
    let addr = start_server().await;

    // Opens TCP and never sends the upgrade request.
    let _stalled = TcpStream::connect(&addr).await.expect("tcp connect");

    let mut ws = tokio::time::timeout(Duration::from_secs(2), connect(&addr))
        .await
        .expect("second client should connect in time");
    send(&mut ws, json!({"type": "ping"})).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::Pong);
}

#[tokio::test]
async fn test_stalled_handshake_is_dropped() {
    let addr = start_server_with(BingoServer::builder().heartbeat(fast_heartbeat())).await;
    let mut stalled = TcpStream::connect(&addr).await.expect("tcp connect");

    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(Duration::from_secs(2), stalled.read(&mut buf))
        .await
        .expect("server should hang up");

    match read {
        Ok(0) | Err(_) => {}
        Ok(n) => panic!("expected EOF, read {n} bytes"),
    }
}

#[tokio::test]
async fn test_rooms_are_shared_across_connections_only_within_a_server() {
    let first = start_server().await;
    let second = start_server().await;
    let mut alice = connect(&first).await;
    let mut bob = connect(&second).await;

    send(&mut alice, create_frame("alice", "Alice")).await;
    recv(&mut alice).await;
    send(&mut bob, join_frame("bob", "Bob")).await;

    match recv(&mut bob).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::RoomNotFound),
        other => panic!("expected error, got {other:?}"),
    }
}
