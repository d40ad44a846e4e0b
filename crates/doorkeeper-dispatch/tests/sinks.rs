//! HTTP sinks and consumers against mock services.

use chrono::{TimeZone, Utc};
use doorkeeper_dispatch::{
    AuditSink, Channel, ChatConfig, ChatSink, DebugLogSink, Deliver, DeliveryError, DispatchItem,
    ItemKind, MembershipSink, RetryPolicy, channel, run_consumer,
};
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn stamped(kind: ItemKind, text: &str) -> DispatchItem {
    DispatchItem::new(kind, text).with_timestamp(Utc.with_ymd_and_hms(2024, 3, 7, 18, 5, 9).unwrap())
}

#[tokio::test]
async fn debug_log_posts_token_timestamp_and_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/acslog")
        .match_body(Matcher::Json(json!({
            "token": "gw-token",
            "timestamp": "2024-03-07 18:05:09",
            "text": "State Locked -> Open",
        })))
        .with_status(200)
        .create_async()
        .await;

    let sink = DebugLogSink::new(server.url(), Some("gw-token".into()), TIMEOUT).unwrap();
    sink.deliver(&stamped(ItemKind::Debug, "State Locked -> Open"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn audit_entries_and_unknown_cards() {
    let mut server = mockito::Server::new_async().await;
    let log = server
        .mock("POST", "/api/v1/logs")
        .match_body(Matcher::Json(json!({
            "api_token": "secret",
            "log": {"user_id": 42, "message": "front: Granted entry"},
        })))
        .with_status(201)
        .create_async()
        .await;
    let unknown = server
        .mock("POST", "/api/v1/unknown_cards")
        .match_body(Matcher::Json(json!({"api_token": "secret", "card_id": "13005D1DA5"})))
        .with_status(200)
        .create_async()
        .await;

    let sink = AuditSink::new(server.url(), Some("secret".into()), TIMEOUT).unwrap();
    sink.deliver(&DispatchItem::new(ItemKind::Audit, "front: Granted entry").with_id(42))
        .await
        .unwrap();
    sink.deliver(&DispatchItem::new(ItemKind::UnknownCard, "13005D1DA5"))
        .await
        .unwrap();

    log.assert_async().await;
    unknown.assert_async().await;
}

#[tokio::test]
async fn audit_sink_reports_server_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/logs")
        .with_status(502)
        .create_async()
        .await;

    let sink = AuditSink::new(server.url(), Some("secret".into()), TIMEOUT).unwrap();
    let err = sink
        .deliver(&DispatchItem::new(ItemKind::Audit, "x").with_id(1))
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::Status(502));
    assert!(err.is_retryable());
}

fn chat_sink(server: &mockito::Server, test_mode: bool) -> ChatSink {
    let config = ChatConfig::default()
        .api_url(format!("{}/api/chat.postMessage", server.url()))
        .token("xoxb-1")
        .test_mode(test_mode);
    ChatSink::new(config).unwrap()
}

#[tokio::test]
async fn chat_posts_with_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat.postMessage")
        .match_header("authorization", "Bearer xoxb-1")
        .match_body(Matcher::Json(json!({
            "channel": "private-monitoring",
            "text": ":lock: Door is locked",
            "icon_emoji": ":panopticon:",
            "parse": "full",
        })))
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;

    chat_sink(&server, false)
        .deliver(&DispatchItem::new(
            ItemKind::Chat(Channel::Monitoring),
            ":lock: Door is locked",
        ))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn chat_reports_api_rejection() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat.postMessage")
        .with_status(200)
        .with_body(r#"{"ok": false, "error": "channel_not_found"}"#)
        .create_async()
        .await;

    let err = chat_sink(&server, false)
        .deliver(&DispatchItem::new(ItemKind::Chat(Channel::General), "hi"))
        .await
        .unwrap_err();
    assert_eq!(err, DeliveryError::rejected("channel_not_found"));
}

#[tokio::test]
async fn chat_test_mode_redirects_and_mutes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat.postMessage")
        .match_body(Matcher::PartialJson(json!({"channel": "testing"})))
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .expect(1)
        .create_async()
        .await;

    let sink = chat_sink(&server, true);
    sink.deliver(&DispatchItem::new(ItemKind::Chat(Channel::Monitoring), "a"))
        .await
        .unwrap();
    sink.deliver(&DispatchItem::new(ItemKind::Chat(Channel::General), "b"))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn membership_puts_timestamp_with_basic_auth() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", Matcher::Regex(r"^/api/member/id/7/".to_string()))
        .match_query(Matcher::UrlEncoded("version".into(), "1".into()))
        .match_header("authorization", "Basic ZG9vcjpzZWNyZXQ=")
        .match_body(Matcher::Json(json!({"members": {"field1": "2024-03-07 18:05:09"}})))
        .with_status(200)
        .create_async()
        .await;

    let sink = MembershipSink::new(
        server.url(),
        Some("door".into()),
        Some("secret".into()),
        TIMEOUT,
    )
    .unwrap();
    sink.deliver(&stamped(ItemKind::Membership, "").with_id(7))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn consumer_without_credential_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let sink = MembershipSink::new(server.url(), Some("door".into()), None, TIMEOUT).unwrap();
    let (dispatcher, queue) = channel("membership", 4);
    dispatcher.enqueue(DispatchItem::new(ItemKind::Membership, "").with_id(7));
    drop(dispatcher);

    run_consumer(queue, sink, RetryPolicy::membership()).await;
    mock.assert_async().await;
}

#[tokio::test]
async fn consumer_retries_debug_log() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/acslog")
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let sink = DebugLogSink::new(server.url(), Some("gw".into()), TIMEOUT).unwrap();
    let (dispatcher, queue) = channel("debug", 4);
    dispatcher.enqueue(DispatchItem::new(ItemKind::Debug, "hello"));
    drop(dispatcher);

    run_consumer(queue, sink, RetryPolicy::new(3, Duration::from_millis(10))).await;
    mock.assert_async().await;
}
