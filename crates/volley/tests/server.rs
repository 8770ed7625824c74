//! Integration tests for the relay server, handler, and full connection flow.
//!
//! Every test starts a server on a random port and talks to it with
//! `tokio-tungstenite` clients, the same way a browser would.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use volley::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    start_server_with(RoomConfig::default()).await
}

async fn start_server_with(room_config: RoomConfig) -> String {
    let server = VolleyServer::builder()
        .bind("127.0.0.1:0")
        .room_config(room_config)
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

    addr
}

/// Connects and consumes the `connected` greeting. Returns the socket and
/// the id the relay assigned to it.
async fn connect(addr: &str) -> (ClientWs, ConnectionId) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    match next_event(&mut ws).await {
        ServerEvent::Connected { connection_id } => (ws, connection_id),
        other => panic!("expected connected, got {other:?}"),
    }
}

async fn send(ws: &mut ClientWs, frame: Value) {
    ws.send(Message::text(frame.to_string()))
        .await
        .expect("send should succeed");
}

/// Waits for the next event frame, skipping control frames.
async fn next_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("websocket error");
        if msg.is_text() || msg.is_binary() {
            return serde_json::from_slice(&msg.into_data()).expect("decode event");
        }
    }
}

/// Asserts nothing arrives for a short while.
async fn assert_quiet(ws: &mut ClientWs) {
    let result = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

async fn join(ws: &mut ClientWs, room: &str, is_host: bool) {
    send(ws, json!({ "event": "joinRoom", "data": { "roomId": room, "isHost": is_host } })).await;
}

/// Joins as host and waits until the relay has seated it: a host's own
/// `phaseConfirmed` is refused, and that refusal only comes back once the
/// join went through.
async fn join_as_host(ws: &mut ClientWs, room: &str) {
    join(ws, room, true).await;
    send(ws, json!({ "event": "phaseConfirmed", "data": { "roomId": room } })).await;
    match next_event(ws).await {
        ServerEvent::Error { code: 403, .. } => {}
        other => panic!("expected the host's own confirmation to be refused, got {other:?}"),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connected_carries_distinct_ids() {
    let addr = start_server().await;

    let (_ws1, id1) = connect(&addr).await;
    let (_ws2, id2) = connect(&addr).await;

    assert_ne!(id1, id2);
}

#[tokio::test]
async fn test_silent_socket_does_not_block_other_clients() {
    let addr = start_server().await;

    // Opens TCP but never sends the upgrade request.
    let _silent = tokio::net::TcpStream::connect(addr.as_str()).await.unwrap();

    let (mut host, _) = tokio::time::timeout(Duration::from_secs(3), connect(&addr))
        .await
        .expect("a silent socket must not stall the accept loop");
    join_as_host(&mut host, "R1").await;
}

#[tokio::test]
async fn test_host_and_player_session() {
    let addr = start_server().await;
    let (mut host, _host_id) = connect(&addr).await;
    let (mut player, player_id) = connect(&addr).await;

    join_as_host(&mut host, "R1").await;
    join(&mut player, "R1", false).await;
    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::PlayerJoined { player_id }
    );

    let orientation = json!({ "alpha": 90, "beta": 10.5, "gamma": 0 });
    send(
        &mut player,
        json!({ "event": "shoot", "data": { "roomId": "R1", "orientation": orientation } }),
    )
    .await;
    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::Shoot {
            participant_id: player_id,
            orientation,
        }
    );

    send(&mut host, json!({ "event": "startNextPhase", "data": { "roomId": "R1" } })).await;
    assert_eq!(next_event(&mut host).await, ServerEvent::NextPhase);
    assert_eq!(next_event(&mut player).await, ServerEvent::NextPhase);

    send(
        &mut player,
        json!({ "event": "phaseConfirmed", "data": { "roomId": "R1", "participantId": player_id } }),
    )
    .await;
    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::PhaseConfirmed { participant_id: player_id }
    );

    player.close(None).await.expect("close");
    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::PlayerRemoved { participant_id: player_id }
    );
}

#[tokio::test]
async fn test_host_disconnect_sends_host_left() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let (mut player, _) = connect(&addr).await;

    join_as_host(&mut host, "R1").await;
    join(&mut player, "R1", false).await;
    next_event(&mut host).await;

    drop(host);
    assert_eq!(next_event(&mut player).await, ServerEvent::HostLeft);
}

#[tokio::test]
async fn test_chat_reaches_everyone_in_the_room() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let (mut player, _) = connect(&addr).await;

    join_as_host(&mut host, "R1").await;
    join(&mut player, "R1", false).await;
    next_event(&mut host).await;

    send(
        &mut player,
        json!({ "event": "sendMessage", "data": { "roomId": "R1", "message": "gg", "sender": "Ana" } }),
    )
    .await;

    let expected = ServerEvent::NewMessage {
        message: "gg".into(),
        sender: "Ana".into(),
    };
    assert_eq!(next_event(&mut player).await, expected);
    assert_eq!(next_event(&mut host).await, expected);
}

#[tokio::test]
async fn test_remove_player_over_the_wire() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let (mut player, player_id) = connect(&addr).await;

    join_as_host(&mut host, "R1").await;
    join(&mut player, "R1", false).await;
    next_event(&mut host).await;

    send(
        &mut host,
        json!({ "event": "removePlayer", "data": { "roomId": "R1", "participantId": player_id } }),
    )
    .await;

    assert_eq!(next_event(&mut player).await, ServerEvent::Removed);
    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::PlayerRemoved { participant_id: player_id }
    );
}

#[tokio::test]
async fn test_second_host_is_refused_with_conflict() {
    let addr = start_server().await;
    let (mut first, _) = connect(&addr).await;
    let (mut second, _) = connect(&addr).await;

    join_as_host(&mut first, "R1").await;
    join(&mut second, "R1", true).await;

    match next_event(&mut second).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, 409);
            assert!(message.contains("already has host"));
        }
        other => panic!("expected error 409, got {other:?}"),
    }
    assert_quiet(&mut first).await;
}

#[tokio::test]
async fn test_replace_policy_hands_over_the_room() {
    let addr = start_server_with(RoomConfig {
        host_claim: HostClaim::Replace,
        ..RoomConfig::default()
    })
    .await;
    let (mut first, _) = connect(&addr).await;
    let (mut second, second_id) = connect(&addr).await;

    join_as_host(&mut first, "R1").await;
    join(&mut second, "R1", true).await;

    assert_eq!(
        next_event(&mut first).await,
        ServerEvent::HostReplaced { host_id: second_id }
    );
}

#[tokio::test]
async fn test_player_cannot_advance_phase() {
    let addr = start_server().await;
    let (mut player, _) = connect(&addr).await;

    join(&mut player, "R1", false).await;
    send(&mut player, json!({ "event": "startNextPhase", "data": { "roomId": "R1" } })).await;

    match next_event(&mut player).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, 403);
            assert!(message.contains("not the host"));
        }
        other => panic!("expected error 403, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frames_and_missing_rooms_are_dropped() {
    let addr = start_server().await;
    let (mut ws, _) = connect(&addr).await;

    ws.send(Message::text("not json".to_string())).await.unwrap();
    send(&mut ws, json!({ "event": "danceParty", "data": { "roomId": "R1" } })).await;
    send(&mut ws, json!({ "event": "startNextPhase", "data": {} })).await;
    send(&mut ws, json!({ "event": "startNextPhase", "data": { "roomId": "ghost" } })).await;

    // The connection is still alive and the next refusal is the first
    // thing it hears.
    join(&mut ws, "R1", false).await;
    send(&mut ws, json!({ "event": "startNextPhase", "data": { "roomId": "R1" } })).await;
    assert!(matches!(
        next_event(&mut ws).await,
        ServerEvent::Error { code: 403, .. }
    ));
}

#[tokio::test]
async fn test_leave_room_notifies_host() {
    let addr = start_server().await;
    let (mut host, _) = connect(&addr).await;
    let (mut player, player_id) = connect(&addr).await;

    join_as_host(&mut host, "R1").await;
    join(&mut player, "R1", false).await;
    next_event(&mut host).await;

    send(&mut player, json!({ "event": "leaveRoom", "data": { "roomId": "R1" } })).await;

    assert_eq!(
        next_event(&mut host).await,
        ServerEvent::PlayerRemoved { participant_id: player_id }
    );
    // Out of the room: chat from there is refused.
    send(
        &mut player,
        json!({ "event": "sendMessage", "data": { "roomId": "R1", "message": "hi" } }),
    )
    .await;
    assert!(matches!(
        next_event(&mut player).await,
        ServerEvent::Error { code: 403, .. }
    ));
}
