//! Scripted transports

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tasksync::client::realtime::{PushStream, PushTransport};
use tasksync::client::sync::TaskTransport;
use tasksync::shared::{SyncError, Task};
use tokio::sync::mpsc;

/// Task transport that records submissions and fails on demand
#[derive(Default)]
pub struct RecordingTransport {
    fail_first: AtomicU32,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    submissions: Mutex<Vec<Vec<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the first `times` submissions with a 503
    pub fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            fail_first: AtomicU32::new(times),
            ..Self::default()
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing(u32::MAX)
    }

    /// Every submission takes `latency` before answering
    pub fn slow(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    /// Task ids of every submission attempt, in order
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskTransport for RecordingTransport {
    async fn submit_batch(&self, tasks: &[Task]) -> Result<(), SyncError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.submissions
            .lock()
            .unwrap()
            .push(tasks.iter().map(|t| t.id.clone()).collect());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::http_status(503, "POST /tasks failed: 503 Service Unavailable"));
        }
        Ok(())
    }
}

type Connection = Result<mpsc::UnboundedReceiver<Result<String, SyncError>>, SyncError>;

/// Push transport whose connections are scripted one open at a time.
///
/// An open with nothing scripted is refused.
#[derive(Default)]
pub struct ScriptedPushTransport {
    opens: AtomicUsize,
    urls: Mutex<Vec<String>>,
    connections: Mutex<VecDeque<Connection>>,
}

impl ScriptedPushTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script an accepted connection; dropping the sender closes it cleanly
    pub fn accept(&self) -> mpsc::UnboundedSender<Result<String, SyncError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().unwrap().push_back(Ok(rx));
        tx
    }

    pub fn refuse(&self) {
        self.connections
            .lock()
            .unwrap()
            .push_back(Err(SyncError::connection("connection refused")));
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for ScriptedPushTransport {
    async fn open(&self, url: &str) -> Result<PushStream, SyncError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let next = self.connections.lock().unwrap().pop_front();
        match next {
            Some(Ok(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|message| (message, rx))
            })
            .boxed()),
            Some(Err(e)) => Err(e),
            None => Err(SyncError::connection("nothing scripted")),
        }
    }
}

/// Wire JSON of a task update
pub fn update_json(task_id: &str, value: &str) -> String {
    serde_json::json!({
        "taskId": task_id,
        "type": "status",
        "value": value,
        "timestamp": 1_700_000_000_000i64,
        "userId": "user-1",
    })
    .to_string()
}
