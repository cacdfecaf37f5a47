//! Realtime channel lifecycle tests

use crate::common::{update_json, ScriptedPushTransport};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasksync::client::realtime::{ConnectionStatus, RealtimeChannel, TaskUpdateFeed};
use tasksync::shared::config::RealtimeConfig;
use tasksync::shared::{SyncError, TaskUpdate};

fn channel(transport: Arc<ScriptedPushTransport>) -> RealtimeChannel {
    RealtimeChannel::new(
        RealtimeConfig {
            url: "http://push.test/updates".to_string(),
            reconnect_delay: Duration::from_millis(1000),
            max_reconnect_attempts: 5,
        },
        transport,
    )
}

fn record_statuses(channel: &RealtimeChannel) -> Arc<Mutex<Vec<ConnectionStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.subscribe_to_status(move |status: &ConnectionStatus| sink.lock().unwrap().push(*status));
    seen
}

fn record_updates(channel: &RealtimeChannel) -> Arc<Mutex<Vec<TaskUpdate>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    channel.subscribe(move |update: &TaskUpdate| sink.lock().unwrap().push(update.clone()));
    seen
}

#[tokio::test(start_paused = true)]
async fn test_connect_delivers_updates() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let channel = channel(transport.clone());
    let updates = record_updates(&channel);

    channel.connect(None);
    server.send(Ok(update_json("t1", "in_progress"))).unwrap();
    server.send(Ok(update_json("t2", "done"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(channel.is_connected());
    assert_eq!(transport.urls(), vec!["http://push.test/updates"]);
    let ids: Vec<String> = updates.lock().unwrap().iter().map(|u| u.task_id.clone()).collect();
    assert_eq!(ids, vec!["t1", "t2"]);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_explicit_url_overrides_default() {
    let transport = ScriptedPushTransport::new();
    let _server = transport.accept();
    let channel = channel(transport.clone());

    channel.connect(Some("http://other.test/push"));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(transport.urls(), vec!["http://other.test/push"]);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_five_reconnects() {
    let transport = ScriptedPushTransport::new();
    let channel = channel(transport.clone());

    channel.connect(None);
    tokio::time::sleep(Duration::from_secs(120)).await;

    // Initial open plus five reconnects
    assert_eq!(transport.opens(), 6);
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_delay_grows_linearly() {
    let transport = ScriptedPushTransport::new();
    let channel = channel(transport.clone());

    channel.connect(None);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.opens(), 1);

    // First reconnect after 1s, second 2s after that
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(transport.opens(), 2);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(transport.opens(), 2);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(transport.opens(), 3);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_attempts() {
    let transport = ScriptedPushTransport::new();
    transport.refuse();
    transport.refuse();
    let server = transport.accept();
    let channel = channel(transport.clone());

    channel.connect(None);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(channel.is_connected());
    assert_eq!(channel.reconnect_attempts(), 0);

    // Server closes; the next reconnect waits the base delay again
    drop(server);
    let _again = transport.accept();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(channel.is_connected());
    assert_eq!(transport.opens(), 4);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_suppresses_reconnect() {
    let transport = ScriptedPushTransport::new();
    let _server = transport.accept();
    let channel = channel(transport.clone());
    let statuses = record_statuses(&channel);

    channel.connect(None);
    tokio::time::sleep(Duration::from_millis(10)).await;
    channel.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(transport.opens(), 1);
    assert_eq!(
        statuses.lock().unwrap().as_slice(),
        &[
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stream_error_publishes_error_then_reconnects() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let _replacement = transport.accept();
    let channel = channel(transport.clone());
    let statuses = record_statuses(&channel);

    channel.connect(None);
    tokio::time::sleep(Duration::from_millis(10)).await;
    server.send(Err(SyncError::connection("reset by peer"))).unwrap();
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(
        statuses.lock().unwrap().as_slice(),
        &[
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Error,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected
        ]
    );
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_dropped() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let channel = channel(transport.clone());
    let updates = record_updates(&channel);

    channel.connect(None);
    server.send(Ok("{not json".to_string())).unwrap();
    server.send(Ok(r#"{"taskId":"t1"}"#.to_string())).unwrap();
    server.send(Ok(update_json("t1", "done"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(updates.lock().unwrap().len(), 1);
    assert!(channel.is_connected());
    assert_eq!(transport.opens(), 1);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_panicking_subscriber_does_not_block_others() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let channel = channel(transport.clone());

    let before = record_updates(&channel);
    channel.subscribe(|_: &TaskUpdate| panic!("subscriber bug"));
    let after = record_updates(&channel);

    channel.connect(None);
    server.send(Ok(update_json("t1", "done"))).unwrap();
    server.send(Ok(update_json("t2", "done"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(before.lock().unwrap().len(), 2);
    assert_eq!(after.lock().unwrap().len(), 2);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_handler_stops_receiving() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let channel = channel(transport.clone());

    let seen = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&seen);
    let subscription = channel.subscribe(move |_: &TaskUpdate| *counter.lock().unwrap() += 1);

    channel.connect(None);
    server.send(Ok(update_json("t1", "a"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(subscription.unsubscribe());

    server.send(Ok(update_json("t1", "b"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(*seen.lock().unwrap(), 1);
    channel.disconnect();
}

#[tokio::test(start_paused = true)]
async fn test_feed_tracks_watched_tasks_only() {
    let transport = ScriptedPushTransport::new();
    let server = transport.accept();
    let channel = channel(transport.clone());

    let feed = TaskUpdateFeed::watch(&channel, ["t2", "t3"]);
    server.send(Ok(update_json("t1", "done"))).unwrap();
    server.send(Ok(update_json("t2", "done"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(feed.is_connected());
    let ids: Vec<String> = feed.updates().into_iter().map(|u| u.task_id).collect();
    assert_eq!(ids, vec!["t2"]);

    feed.set_task_ids(["t1"]);
    server.send(Ok(update_json("t1", "reopened"))).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(feed.updates().len(), 2);

    feed.detach();
    channel.disconnect();
}
