// End-to-end tests: the real WebSocket transport against an in-process
// server. The server side speaks the chat protocol by hand so the tests
// control exactly what the client sees, including hard connection drops.

use banter::{ChatSession, Identity, LogEntry, NullRenderer, SessionState, WsTransport};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

// ── Server-side helpers ────────────────────────────────────────────────────

/// Read frames until a text frame arrives; assert its event name and return
/// the payload. Answers pings along the way.
async fn expect_event(ws: &mut WebSocketStream<TcpStream>, name: &str) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .expect("websocket error");
        match msg {
            WsMessage::Text(text) => {
                let envelope: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(envelope["event"], name, "unexpected event in {text}");
                return envelope["data"].clone();
            }
            WsMessage::Ping(data) => {
                let _ = ws.send(WsMessage::Pong(data)).await;
            }
            _ => continue,
        }
    }
}

async fn send_event(ws: &mut WebSocketStream<TcpStream>, envelope: serde_json::Value) {
    ws.send(WsMessage::Text(envelope.to_string())).await.unwrap();
}

/// Keep the connection open until the client sends Close or drops.
async fn hold_until_closed(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(msg)) = ws.next().await {
        if matches!(msg, WsMessage::Close(_)) {
            break;
        }
    }
}

// ── Client-side helpers ────────────────────────────────────────────────────

async fn wait_for_state(session: &ChatSession, want: SessionState) {
    let mut rx = session.state_watch();
    for _ in 0..200 {
        if *rx.borrow() == want {
            return;
        }
        let _ = tokio::time::timeout(Duration::from_millis(50), rx.changed()).await;
    }
    panic!("state never became {want}, still {}", session.state());
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never met");
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn join_history_echo_and_roster_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        assert_eq!(expect_event(&mut ws, "userJoin").await, "alice");
        send_event(
            &mut ws,
            json!({"event": "chatHistory", "data": [
                {"user": "bob", "message": "hi", "timestamp": "2024-01-01T00:00:00Z"}
            ]}),
        )
        .await;

        // echo the client's message back with a server timestamp
        assert_eq!(expect_event(&mut ws, "chatMessage").await, "hello");
        send_event(
            &mut ws,
            json!({"event": "chatMessage", "data":
                {"user": "alice", "message": "hello", "timestamp": "2024-01-01T00:00:01Z"}}),
        )
        .await;

        send_event(
            &mut ws,
            json!({"event": "userJoined", "data":
                {"user": "carol", "activeUsers": [{"username": "alice"}, {"username": "carol"}]}}),
        )
        .await;

        hold_until_closed(&mut ws).await;
    });

    let transport = Arc::new(WsTransport::new(None));
    let session = ChatSession::new(transport, Box::new(NullRenderer));
    session
        .start(Identity::new("alice"), &format!("ws://{addr}/ws"))
        .await
        .unwrap();
    wait_for_state(&session, SessionState::Joined).await;
    assert_eq!(session.log_snapshot().len(), 1);

    session.submit_message("hello").await.unwrap();
    wait_until(|| session.log_snapshot().len() >= 2).await;

    let log = session.log_snapshot();
    assert!(matches!(&log[0], LogEntry::Message(m) if m.user == "bob" && m.message == "hi"));
    assert!(matches!(&log[1], LogEntry::Message(m) if m.user == "alice" && m.message == "hello"));

    wait_until(|| session.online_count() == 2).await;
    assert_eq!(session.roster(), vec!["alice", "carol"]);
    assert!(matches!(&session.log_snapshot()[2], LogEntry::System(line) if line == "carol joined the chat"));

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn server_drop_triggers_rejoin_and_history_replacement() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        // first connection: join, history, then a hard drop
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        assert_eq!(expect_event(&mut ws, "userJoin").await, "alice");
        send_event(
            &mut ws,
            json!({"event": "chatHistory", "data": [
                {"user": "bob", "message": "hi", "timestamp": "2024-01-01T00:00:00Z"}
            ]}),
        )
        .await;
        drop(ws);

        // leave the client in Reconnecting long enough for the test to see it
        tokio::time::sleep(Duration::from_millis(500)).await;

        // the client redials; the fresh history includes what it missed
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        assert_eq!(expect_event(&mut ws, "userJoin").await, "alice");
        send_event(
            &mut ws,
            json!({"event": "chatHistory", "data": [
                {"user": "bob", "message": "hi", "timestamp": "2024-01-01T00:00:00Z"},
                {"user": "carol", "message": "missed this", "timestamp": "2024-01-01T00:00:05Z"}
            ]}),
        )
        .await;
        hold_until_closed(&mut ws).await;
    });

    let transport = Arc::new(WsTransport::new(None));
    let session = ChatSession::new(transport, Box::new(NullRenderer));
    session
        .start(Identity::new("alice"), &format!("ws://{addr}/ws"))
        .await
        .unwrap();
    // the server drops the first connection right after the backfill; the
    // session recovers on its own
    wait_for_state(&session, SessionState::Reconnecting).await;
    wait_for_state(&session, SessionState::Joined).await;

    // the rejoin history replaces the log wholesale: no duplicates, and the
    // "reconnecting" system line is gone
    wait_until(|| {
        let log = session.log_snapshot();
        log.len() == 2 && log.iter().all(|e| matches!(e, LogEntry::Message(_)))
    })
    .await;
    let log = session.log_snapshot();
    assert!(matches!(&log[0], LogEntry::Message(m) if m.message == "hi"));
    assert!(matches!(&log[1], LogEntry::Message(m) if m.message == "missed this"));

    session.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn flapping_server_redials_are_rate_limited() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // a server that completes every handshake and immediately hangs up
    let connections = Arc::new(AtomicU32::new(0));
    let server = {
        let connections = connections.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                connections.fetch_add(1, Ordering::SeqCst);
                if let Ok(ws) = accept_async(stream).await {
                    drop(ws);
                }
            }
        })
    };

    let transport = Arc::new(WsTransport::new(None));
    let session = ChatSession::new(transport, Box::new(NullRenderer));
    session
        .start(Identity::new("alice"), &format!("ws://{addr}/ws"))
        .await
        .unwrap();

    // every redial must wait out a backoff, so only a handful of connections
    // fit in this window; an unthrottled client makes thousands
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let seen = connections.load(Ordering::SeqCst);
    assert!(seen >= 2, "client never redialed ({seen} connections)");
    assert!(seen <= 4, "{seen} connections in 2.5s, redials are not backed off");

    session.close().await;
    server.abort();
}
