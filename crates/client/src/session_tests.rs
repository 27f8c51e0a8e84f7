// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::client::ClientOptions;
use crate::credential::StaticCredential;
use crate::error::ClientError;
use crate::history::HistoryFuture;
use crate::reconnect::ReconnectPolicy;
use crate::store::ChatStore;
use crate::test_helpers::{settle, MockHandle, MockTransport};
use parley_core::Command;
use serde_json::{json, Value};
use std::time::Duration;

const USER: &str = "u1";

fn session_with(
    credential: StaticCredential,
    max_attempts: u32,
) -> (ChatSession<ChatStore>, MockHandle) {
    let (mock, handle) = MockTransport::new();
    let options = ClientOptions::default()
        .with_endpoint("ws://chat.test/ws")
        .with_policy(ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_attempts,
        });
    let (client, events) = TransportClient::with_transport(options, Arc::new(credential), mock);
    let session = ChatSession::new(
        client,
        events,
        MessageRouter::new(100, Some("http://cdn.test".to_string())),
        ChatStore::new(),
        USER,
    );
    (session, handle)
}

async fn connected_session() -> (ChatSession<ChatStore>, MockHandle) {
    let (mut session, handle) = session_with(StaticCredential::new("tok"), 3);
    session.start();
    assert_eq!(next(&mut session).await, ClientEvent::Connected);
    settle().await;
    (session, handle)
}

async fn next(session: &mut ChatSession<ChatStore>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(300), session.next_event())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn next_message_id(session: &mut ChatSession<ChatStore>) -> String {
    loop {
        if let ClientEvent::Message(message) = next(session).await {
            return message.id.to_string();
        }
    }
}

fn raw(id: u32, secs: u32) -> String {
    json!({
        "id": id,
        "content": format!("message {}", id),
        "senderId": "peer",
        "receiverId": USER,
        "timestamp": format!("2024-03-01T10:00:{:02}Z", secs),
    })
    .to_string()
}

struct MemoryHistory(Vec<Value>);

impl HistorySource for MemoryHistory {
    fn fetch_history(&self, _peer_id: &str, limit: usize) -> HistoryFuture<'_> {
        let page: Vec<Value> = self.0.iter().take(limit).cloned().collect();
        Box::pin(async move { Ok(page) })
    }
}

struct FailingHistory;

impl HistorySource for FailingHistory {
    fn fetch_history(&self, _peer_id: &str, _limit: usize) -> HistoryFuture<'_> {
        Box::pin(async { Err(HistoryError::Request("503".to_string())) })
    }
}

#[tokio::test(start_paused = true)]
async fn connect_subscribes_private_and_broadcast() {
    let (session, handle) = connected_session().await;

    let topics: Vec<String> = handle
        .sent_of(Command::Subscribe)
        .iter()
        .filter_map(|f| f.header("destination").map(str::to_string))
        .collect();
    assert_eq!(topics, vec!["/user/u1/queue/messages", "/topic/public"]);
    assert_eq!(session.sink().status(), ConnectionState::Connected);
    assert_eq!(session.client().subscription_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_live_messages_are_stored_once() {
    let (mut session, handle) = connected_session().await;

    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 1));
    handle.deliver_message("/user/u1/queue/messages", &raw(1, 1));
    handle.deliver_message(BROADCAST_TOPIC, "not json");
    handle.deliver_message(BROADCAST_TOPIC, &raw(2, 2));

    assert_eq!(next_message_id(&mut session).await, "1");
    assert_eq!(next_message_id(&mut session).await, "2");
    assert_eq!(session.sink().messages().len(), 2);
    assert!(session.sink().last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn out_of_order_messages_are_displayed_sorted() {
    let (mut session, handle) = connected_session().await;

    handle.deliver_message(BROADCAST_TOPIC, &raw(2, 30));
    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 10));
    next_message_id(&mut session).await;
    next_message_id(&mut session).await;

    let ids: Vec<&str> = session
        .sink()
        .messages()
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test(start_paused = true)]
async fn history_marks_ids_seen() {
    let (mut session, handle) = connected_session().await;
    let history = MemoryHistory(vec![
        serde_json::from_str(&raw(5, 5)).unwrap(),
        json!({"id": 6}),
        serde_json::from_str(&raw(7, 7)).unwrap(),
    ]);

    let loaded = session.load_history(&history, "peer", 50).await.unwrap();
    assert_eq!(loaded, 2);
    assert_eq!(session.sink().conversation(USER, "peer").len(), 2);

    handle.deliver_message(BROADCAST_TOPIC, &raw(5, 5));
    handle.deliver_message(BROADCAST_TOPIC, &raw(8, 8));
    assert_eq!(next_message_id(&mut session).await, "8");
    assert_eq!(session.sink().messages().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn history_respects_limit_and_reports_failures() {
    let (mut session, _handle) = connected_session().await;
    let history = MemoryHistory(vec![
        serde_json::from_str(&raw(1, 1)).unwrap(),
        serde_json::from_str(&raw(2, 2)).unwrap(),
    ]);
    assert_eq!(session.load_history(&history, "peer", 1).await.unwrap(), 1);

    let err = session
        .load_history(&FailingHistory, "peer", 10)
        .await
        .unwrap_err();
    assert_eq!(err, HistoryError::Request("503".to_string()));
}

#[tokio::test(start_paused = true)]
async fn seen_ids_survive_reconnect_by_default() {
    let (mut session, handle) = connected_session().await;
    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 1));
    assert_eq!(next_message_id(&mut session).await, "1");

    handle.drop_connection();
    while next(&mut session).await != ClientEvent::Connected {}
    settle().await;

    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 1));
    handle.deliver_message(BROADCAST_TOPIC, &raw(2, 2));
    assert_eq!(next_message_id(&mut session).await, "2");
}

#[tokio::test(start_paused = true)]
async fn seen_ids_cleared_on_reconnect_when_configured() {
    let (session, handle) = session_with(StaticCredential::new("tok"), 3);
    let mut session = session.clear_seen_on_reconnect(true);
    session.start();
    while next(&mut session).await != ClientEvent::Connected {}
    settle().await;

    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 1));
    assert_eq!(next_message_id(&mut session).await, "1");

    handle.drop_connection();
    while next(&mut session).await != ClientEvent::Connected {}
    settle().await;

    handle.deliver_message(BROADCAST_TOPIC, &raw(1, 1));
    assert_eq!(next_message_id(&mut session).await, "1");
    // The store still holds a single copy.
    assert_eq!(session.sink().messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn resubscribes_after_reconnect() {
    let (mut session, handle) = connected_session().await;
    handle.drop_connection();
    while next(&mut session).await != ClientEvent::Connected {}
    settle().await;

    assert_eq!(handle.sent_of(Command::Subscribe).len(), 4);
    assert_eq!(session.client().subscription_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn send_text_publishes_outgoing_message() {
    let (session, handle) = connected_session().await;

    assert!(session.send_text("peer", "hello"));
    assert!(!session.send_text("peer", "   "));
    settle().await;

    let sends = handle.sent_of(Command::Send);
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].header("destination"), Some(SEND_DESTINATION));
    let body: Value = serde_json::from_str(&sends[0].body).unwrap();
    assert_eq!(body["senderId"], USER);
    assert_eq!(body["receiverId"], "peer");
    assert_eq!(body["content"], "hello");
}

#[tokio::test(start_paused = true)]
async fn send_attachment_carries_file() {
    let (session, handle) = connected_session().await;
    let upload = UploadReceipt {
        url: "/uploads/cat.png".to_string(),
        file_type: Some("image/png".to_string()),
        file_name: Some("cat.png".to_string()),
    };

    assert!(session.send_attachment("peer", &upload, ""));
    settle().await;

    let body: Value = serde_json::from_str(&handle.sent_of(Command::Send)[0].body).unwrap();
    assert_eq!(body["fileUrl"], "/uploads/cat.png");
    assert_eq!(body["fileType"], "image/png");
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_fails() {
    let (session, _handle) = session_with(StaticCredential::new("tok"), 3);
    assert!(!session.send_text("peer", "hello"));
}

#[tokio::test(start_paused = true)]
async fn missing_credential_reaches_store() {
    let (mut session, handle) = session_with(StaticCredential::none(), 3);
    session.start();

    assert_eq!(
        next(&mut session).await,
        ClientEvent::Error(ClientError::MissingCredential)
    );
    assert_eq!(
        session.sink().last_error(),
        Some(&ClientError::MissingCredential)
    );
    assert_eq!(session.sink().status(), ConnectionState::Disconnected);
    assert_eq!(handle.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_mark_store_failed() {
    let (mut session, handle) = session_with(StaticCredential::new("tok"), 2);
    handle.fail_next_connects(5);
    session.start();

    loop {
        if let ClientEvent::Error(e) = next(&mut session).await {
            if e.is_terminal() {
                break;
            }
        }
    }
    assert_eq!(session.sink().status(), ConnectionState::Failed);
    assert_eq!(
        session.sink().last_error(),
        Some(&ClientError::RetriesExhausted { attempts: 2 })
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_updates_store() {
    let (mut session, _handle) = connected_session().await;
    session.disconnect();
    assert_eq!(next(&mut session).await, ClientEvent::Disconnected);
    assert_eq!(session.sink().status(), ConnectionState::Disconnected);

    let store = session.shutdown().await;
    assert_eq!(store.status(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn from_config_requires_user_id() {
    let config = ClientConfig {
        endpoint: Some("ws://127.0.0.1:1/ws".to_string()),
        ..ClientConfig::default()
    };
    let result = ChatSession::from_config(
        &config,
        Arc::new(StaticCredential::new("tok")),
        ChatStore::new(),
    );
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn from_config_builds_idle_session() {
    let config = ClientConfig {
        endpoint: Some("ws://127.0.0.1:1/ws".to_string()),
        user_id: Some("42".to_string()),
        ..ClientConfig::default()
    };
    let session = ChatSession::from_config(
        &config,
        Arc::new(StaticCredential::new("tok")),
        ChatStore::new(),
    )
    .unwrap();
    assert_eq!(session.user_id(), "42");
    assert_eq!(session.state(), ConnectionState::Disconnected);
}
