//! Gateway client against a mock gateway.

use doorkeeper_controller::{
    GatewayClient, GatewayConfig, GatewayError, GatewayLink, GatewayStatus, run_sync,
};
use doorkeeper_core::RemoteCommand;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

fn client(server: &mockito::Server) -> GatewayClient {
    GatewayClient::new(
        GatewayConfig::new(server.url(), "gw-token")
            .sync_interval(Duration::from_millis(10))
            .max_failures(3),
    )
    .unwrap()
}

fn status() -> GatewayStatus {
    GatewayStatus {
        door: "closed",
        space: "closed",
        lock_status: "locked",
        log_overflows: 2,
    }
}

#[tokio::test]
async fn sync_pushes_status_and_records_action() {
    let mut server = mockito::Server::new_async().await;
    let push = server
        .mock("POST", "/acsstatus")
        .match_body(Matcher::Json(json!({
            "token": "gw-token",
            "status": {
                "door": "closed",
                "space": "closed",
                "lock status": "locked",
                "log_overflows": 2,
            },
        })))
        .with_status(200)
        .create_async()
        .await;
    let query = server
        .mock("POST", "/acsquery")
        .match_body(Matcher::Json(json!({"token": "gw-token"})))
        .with_status(200)
        .with_body(r#"{"action": "unlock", "allow_open": true}"#)
        .create_async()
        .await;

    let link = GatewayLink::new();
    link.set_status(status());
    client(&server).sync_once(&link).await.unwrap();

    push.assert_async().await;
    query.assert_async().await;
    assert_eq!(link.take_action(), Some(RemoteCommand::Unlock));
    assert!(link.allow_open());
}

#[tokio::test]
async fn sync_without_status_only_queries() {
    let mut server = mockito::Server::new_async().await;
    let push = server
        .mock("POST", "/acsstatus")
        .expect(0)
        .create_async()
        .await;
    server
        .mock("POST", "/acsquery")
        .with_status(200)
        .with_body(r#"{"action": ""}"#)
        .create_async()
        .await;

    let link = GatewayLink::new();
    client(&server).sync_once(&link).await.unwrap();
    assert_eq!(link.take_action(), None);
    assert!(!link.allow_open());
    push.assert_async().await;
}

#[tokio::test]
async fn sync_gives_up_after_consecutive_failures() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/acsquery")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let err = run_sync(GatewayLink::new(), client(&server))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GatewayError::TooManyFailures {
            count: 3,
            last: "HTTP 502".to_string(),
        }
    );
}

#[tokio::test]
async fn malformed_query_reply_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/acsquery")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client(&server).query().await.unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
}
