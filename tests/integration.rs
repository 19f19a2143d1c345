//! Integration tests for end-to-end collaboration sessions.
//!
//! These tests start a real server and connect real WebSocket clients,
//! verifying presence broadcasts, relay inclusion rules, and disconnect
//! cleanup through the full network stack.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use smartcode_collab::client::CollabClient;
use smartcode_collab::protocol::ServerEvent;
use smartcode_collab::server::{CollabServer, ServerConfig};
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

/// Find a free port for testing.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a server on a free port, return it with its port.
async fn start_test_server(allowed_origins: Vec<String>) -> (Arc<CollabServer>, u16) {
    let port = free_port().await;
    let config = ServerConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        allowed_origins,
        ..ServerConfig::default()
    };
    let server = Arc::new(CollabServer::new(config));
    let runner = server.clone();
    tokio::spawn(async move {
        runner.run().await.unwrap();
    });
    // Give server time to bind
    tokio::time::sleep(Duration::from_millis(50)).await;
    (server, port)
}

/// Connect a client and join a room.
async fn join_client(url: &str, room: &str, name: &str) -> CollabClient {
    let mut client = CollabClient::connect(url).await.unwrap();
    client.join(room, name).await.unwrap();
    client
}

/// Receive the next server event, bounded by a generous timeout.
async fn recv(client: &mut CollabClient) -> Option<ServerEvent> {
    timeout(Duration::from_secs(2), client.next_event())
        .await
        .ok()
        .flatten()
}

/// Assert that no event arrives within a short window.
async fn assert_silent(client: &mut CollabClient) {
    let result = timeout(Duration::from_millis(200), client.next_event()).await;
    assert!(result.is_err(), "expected no event, got {result:?}");
}

#[tokio::test]
async fn test_server_accepts_connections() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let result = tokio_tungstenite::connect_async(&url).await;
    assert!(result.is_ok(), "Should connect to server");
}

#[tokio::test]
async fn test_join_broadcasts_member_list() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    assert_eq!(
        recv(&mut alice).await,
        Some(ServerEvent::UserJoined(vec!["alice".into()]))
    );

    let mut bob = join_client(&url, "r1", "bob").await;
    let snapshot = ServerEvent::UserJoined(vec!["alice".into(), "bob".into()]);
    assert_eq!(recv(&mut bob).await, Some(snapshot.clone()));
    assert_eq!(recv(&mut alice).await, Some(snapshot));
}

#[tokio::test]
async fn test_code_change_reaches_peers_only() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut bob = join_client(&url, "r1", "bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    alice.send_code("r1", "print(1)").await.unwrap();

    assert_eq!(
        recv(&mut bob).await,
        Some(ServerEvent::CodeUpdate("print(1)".into()))
    );
    // The editor applies its own edits locally; no echo to the sender.
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_typing_reaches_peers_only() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut bob = join_client(&url, "r1", "bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    bob.send_typing("r1", "bob").await.unwrap();

    assert_eq!(
        recv(&mut alice).await,
        Some(ServerEvent::UserTyping("bob".into()))
    );
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_language_change_reaches_everyone() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut bob = join_client(&url, "r1", "bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    alice.send_language("r1", "python").await.unwrap();

    let update = ServerEvent::LanguageUpdate("python".into());
    assert_eq!(recv(&mut alice).await, Some(update.clone()));
    assert_eq!(recv(&mut bob).await, Some(update));
}

#[tokio::test]
async fn test_leave_room_broadcasts_to_remaining() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut bob = join_client(&url, "r1", "bob").await;
    recv(&mut bob).await;
    recv(&mut alice).await;

    bob.leave().await.unwrap();

    assert_eq!(
        recv(&mut alice).await,
        Some(ServerEvent::UserJoined(vec!["alice".into()]))
    );
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_disconnect_broadcasts_to_remaining() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let bob = join_client(&url, "r1", "bob").await;

    // Abrupt close, no leaveRoom: the reaper must produce the same
    // membership update an explicit leave would.
    bob.close().await;

    // First the two-name snapshot from bob's join, then the shrink.
    assert_eq!(
        recv(&mut alice).await,
        Some(ServerEvent::UserJoined(vec!["alice".into(), "bob".into()]))
    );
    assert_eq!(
        recv(&mut alice).await,
        Some(ServerEvent::UserJoined(vec!["alice".into()]))
    );
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut carol = join_client(&url, "r2", "carol").await;
    recv(&mut carol).await;

    alice.send_code("r1", "x = 1").await.unwrap();
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn test_malformed_frames_are_ignored_silently() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    // Bad JSON, unknown event, join missing a field: all dropped without
    // an error frame and without closing the connection.
    for frame in [
        "{{{not json",
        r#"{"event":"selfDestruct","data":{}}"#,
        r#"{"event":"join","data":{"roomId":"r1"}}"#,
    ] {
        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
    }

    // A valid join still works afterwards.
    ws.send(Message::Text(
        r#"{"event":"join","data":{"roomId":"r1","userName":"mallory"}}"#
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let reply = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("connection should still be live")
        .unwrap()
        .unwrap();
    match reply {
        Message::Text(text) => {
            let event = ServerEvent::decode(text.as_str()).unwrap();
            assert_eq!(event, ServerEvent::UserJoined(vec!["mallory".into()]));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn test_origin_allow_list_enforced() {
    let allowed = vec!["http://localhost:5173".to_string()];
    let (_server, port) = start_test_server(allowed).await;
    let url = format!("ws://127.0.0.1:{port}");

    // Listed origin: accepted.
    let mut request = url.clone().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://localhost:5173".parse().unwrap());
    assert!(tokio_tungstenite::connect_async(request).await.is_ok());

    // Unlisted origin: rejected during the handshake.
    let mut request = url.clone().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "https://evil.example".parse().unwrap());
    assert!(tokio_tungstenite::connect_async(request).await.is_err());

    // No origin at all: rejected.
    let request = url.into_client_request().unwrap();
    assert!(tokio_tungstenite::connect_async(request).await.is_err());
}

#[tokio::test]
async fn test_server_stats_track_sessions() {
    let (server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    let mut alice = join_client(&url, "r1", "alice").await;
    recv(&mut alice).await;
    let mut bob = join_client(&url, "r1", "bob").await;
    recv(&mut bob).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = server.stats().await;
    assert_eq!(stats.total_connections, 2);
    assert_eq!(stats.active_connections, 2);
    assert_eq!(stats.active_rooms, 1);
    assert!(stats.total_messages >= 2);

    bob.close().await;
    alice.close().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = server.stats().await;
    assert_eq!(stats.active_connections, 0);
    assert_eq!(stats.active_rooms, 0);
}

/// The full session script: join, join, edit, disconnect.
#[tokio::test]
async fn test_full_session_scenario() {
    let (_server, port) = start_test_server(Vec::new()).await;
    let url = format!("ws://127.0.0.1:{port}");

    // X joins "r1" as alice and sees itself in the snapshot.
    let mut x = join_client(&url, "r1", "alice").await;
    assert_eq!(
        recv(&mut x).await,
        Some(ServerEvent::UserJoined(vec!["alice".into()]))
    );

    // Y joins as bob; both see the updated snapshot.
    let mut y = join_client(&url, "r1", "bob").await;
    let both = ServerEvent::UserJoined(vec!["alice".into(), "bob".into()]);
    assert_eq!(recv(&mut y).await, Some(both.clone()));
    assert_eq!(recv(&mut x).await, Some(both));

    // X edits; only Y receives the update.
    x.send_code("r1", "print(1)").await.unwrap();
    assert_eq!(
        recv(&mut y).await,
        Some(ServerEvent::CodeUpdate("print(1)".into()))
    );

    // Y disconnects; X sees the shrunken snapshot.
    y.close().await;
    assert_eq!(
        recv(&mut x).await,
        Some(ServerEvent::UserJoined(vec!["alice".into()]))
    );
}
