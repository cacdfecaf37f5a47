//! HTTP transport tests against a mock backend

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tasksync::client::realtime::{HttpPushTransport, PushTransport, RealtimeChannel, TaskUpdateFeed};
use tasksync::client::sync::{HttpTaskTransport, TaskTransport};
use tasksync::shared::config::RealtimeConfig;
use tasksync::shared::{AppConfig, ErrorKind, Task};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tasks_url(server: &MockServer) -> String {
    AppConfig::builder()
        .api_url(format!("{}/api/v1", server.uri()))
        .build()
        .unwrap()
        .tasks_url()
}

#[tokio::test]
async fn test_submit_posts_tasks_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tasks"))
        .and(body_json(json!({
            "tasks": [
                {"id": "t1", "title": "Call the plumber", "priority": "high"},
                {"id": "t2", "title": "Book flights"}
            ]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTaskTransport::new(tasks_url(&server));
    let batch = vec![
        Task::new("t1", "Call the plumber").with_field("priority", json!("high")),
        Task::new("t2", "Book flights"),
    ];

    transport.submit_batch(&batch).await.unwrap();
}

#[tokio::test]
async fn test_server_error_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let transport = HttpTaskTransport::new(tasks_url(&server));
    let err = transport.submit_batch(&[Task::new("t1", "one")]).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.user_message(), "Server error occurred");
    assert!(err.to_string().contains("database unavailable"));
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let transport = HttpTaskTransport::new(tasks_url(&server));
    let err = transport.submit_batch(&[]).await.unwrap_err();

    assert!(err.is_auth_error());
    assert_eq!(err.user_message(), "Authentication required");
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let transport = HttpTaskTransport::new("http://127.0.0.1:9/api/v1/tasks");
    let err = transport.submit_batch(&[Task::new("t1", "one")]).await.unwrap_err();
    assert!(err.is_network_error());
}

#[tokio::test]
async fn test_push_stream_splits_ndjson() {
    let server = MockServer::start().await;
    let body = format!(
        "{}\n\n{}\n",
        json!({"taskId": "t1", "type": "status", "value": "done", "timestamp": 1, "userId": "u"}),
        json!({"taskId": "t2", "type": "priority", "value": 2, "timestamp": 2, "userId": "u"}),
    );
    Mock::given(method("GET"))
        .and(path("/ws"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let transport = HttpPushTransport::new();
    let messages: Vec<String> = transport
        .open(&format!("{}/ws", server.uri()))
        .await
        .unwrap()
        .map(|m| m.unwrap())
        .collect()
        .await;

    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("\"t1\""));
    assert!(messages[1].contains("\"priority\""));
}

#[tokio::test]
async fn test_push_open_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = HttpPushTransport::new();
    let err = transport.open(&format!("{}/ws", server.uri())).await.err().unwrap();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_channel_over_http_push() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"taskId": "t9", "type": "content", "value": {"title": "new"}, "timestamp": 3, "userId": "u"})
    );
    Mock::given(method("GET"))
        .and(path("/ws"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let channel = RealtimeChannel::new(
        RealtimeConfig {
            url: format!("{}/ws", server.uri()),
            reconnect_delay: Duration::from_secs(30),
            max_reconnect_attempts: 5,
        },
        Arc::new(HttpPushTransport::new()),
    );
    let feed = TaskUpdateFeed::watch(&channel, ["t9"]);

    let mut received = Vec::new();
    for _ in 0..50 {
        received = feed.updates();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].value, json!({"title": "new"}));
    feed.detach();
    channel.disconnect();
}
