//! # Realtime Update Channel
//!
//! Reconnecting push client fanning task updates out to subscribers.
//!
//! ## State Machine
//!
//! ```text
//! disconnected -> connecting -> connected
//!      ^              |             |
//!      |              v             v
//!      +---------- error <----- stream error
//! ```
//!
//! - A clean close publishes `disconnected`; a failed open or broken stream
//!   publishes `error` then `disconnected`
//! - After any close a reconnect is scheduled after `reconnect_delay * n`
//!   for the n-th consecutive reconnect, up to `max_reconnect_attempts`
//! - A successful open resets the counter; so does an explicit `connect`
//! - `disconnect` stops the connection task; nothing reconnects afterwards
//!
//! ## Handlers
//!
//! Handlers run synchronously on the connection task in registration order.
//! A panicking handler is logged and skipped; the rest still see the event.
//! Malformed messages are logged and dropped without touching the
//! connection.

use crate::client::realtime::transport::PushTransport;
use crate::shared::config::RealtimeConfig;
use crate::shared::task::TaskUpdate;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Connection status published to status subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct HandlerRegistry<T> {
    kind: &'static str,
    handlers: Mutex<Vec<(Uuid, Handler<T>)>>,
}

impl<T> HandlerRegistry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Uuid, Handler<T>)>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self, handler: Handler<T>) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().push((id, handler));
        id
    }

    fn remove(&self, id: Uuid) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn dispatch(&self, value: &T) {
        // Handlers may (un)subscribe while being called
        let handlers: Vec<Handler<T>> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                tracing::error!(kind = self.kind, "Realtime handler panicked");
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum HandlerKind {
    Update,
    Status,
}

/// Registration returned by `subscribe` and `subscribe_to_status`.
///
/// Dropping it keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    channel: Weak<ChannelInner>,
    id: Uuid,
    kind: HandlerKind,
}

impl Subscription {
    /// Remove the handler; `false` when it was already gone
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.channel.upgrade() else {
            return false;
        };
        match self.kind {
            HandlerKind::Update => inner.update_handlers.remove(self.id),
            HandlerKind::Status => inner.status_handlers.remove(self.id),
        }
    }
}

struct ChannelState {
    status: ConnectionStatus,
    /// Bumped whenever a connection task is replaced or stopped
    generation: u64,
    reconnect_attempts: u32,
    closed_intentionally: bool,
    task: Option<JoinHandle<()>>,
}

struct ChannelInner {
    config: RealtimeConfig,
    transport: Arc<dyn PushTransport>,
    state: Mutex<ChannelState>,
    update_handlers: HandlerRegistry<TaskUpdate>,
    status_handlers: HandlerRegistry<ConnectionStatus>,
}

impl std::fmt::Debug for ChannelInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelInner")
            .field("url", &self.config.url)
            .field("update_handlers", &self.update_handlers.len())
            .field("status_handlers", &self.status_handlers.len())
            .finish()
    }
}

impl ChannelInner {
    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `status` if `generation` still owns the channel
    fn set_status(&self, generation: u64, status: ConnectionStatus) -> bool {
        let changed = {
            let mut state = self.lock_state();
            if state.generation != generation || state.closed_intentionally {
                return false;
            }
            let changed = state.status != status;
            state.status = status;
            changed
        };
        if changed {
            self.status_handlers.dispatch(&status);
        }
        true
    }

    fn mark_open(&self, generation: u64) -> bool {
        {
            let mut state = self.lock_state();
            if state.generation != generation || state.closed_intentionally {
                return false;
            }
            state.reconnect_attempts = 0;
        }
        self.set_status(generation, ConnectionStatus::Connected)
    }

    /// Delay before the next reconnect, `None` once the budget is spent
    fn next_reconnect_delay(&self, generation: u64) -> Option<Duration> {
        let mut state = self.lock_state();
        if state.generation != generation || state.closed_intentionally {
            return None;
        }
        if state.reconnect_attempts >= self.config.max_reconnect_attempts {
            tracing::error!(
                attempts = state.reconnect_attempts,
                "Max reconnection attempts reached"
            );
            return None;
        }
        state.reconnect_attempts += 1;
        Some(self.config.reconnect_delay * state.reconnect_attempts)
    }

    fn dispatch_message(&self, message: &str) {
        match serde_json::from_str::<TaskUpdate>(message) {
            Ok(update) => {
                tracing::debug!(task_id = %update.task_id, kind = ?update.kind, "Task update received");
                self.update_handlers.dispatch(&update);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed realtime message");
            }
        }
    }
}

async fn run_connection(inner: Arc<ChannelInner>, url: String, generation: u64) {
    loop {
        if !inner.set_status(generation, ConnectionStatus::Connecting) {
            return;
        }

        match inner.transport.open(&url).await {
            Ok(mut messages) => {
                if !inner.mark_open(generation) {
                    return;
                }
                tracing::info!(url = %url, "Realtime channel connected");

                let mut broken = false;
                while let Some(message) = messages.next().await {
                    match message {
                        Ok(message) => inner.dispatch_message(&message),
                        Err(e) => {
                            tracing::error!(url = %url, error = %e, "Realtime stream error");
                            inner.set_status(generation, ConnectionStatus::Error);
                            broken = true;
                            break;
                        }
                    }
                }
                if !broken {
                    tracing::info!(url = %url, "Realtime stream closed");
                }
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Realtime connection failed");
                inner.set_status(generation, ConnectionStatus::Error);
            }
        }

        if !inner.set_status(generation, ConnectionStatus::Disconnected) {
            return;
        }
        let Some(delay) = inner.next_reconnect_delay(generation) else {
            return;
        };
        tracing::info!(delay_ms = delay.as_millis() as u64, "Scheduling realtime reconnect");
        tokio::time::sleep(delay).await;
    }
}

/// Handle to the realtime channel; clones share one connection
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig, transport: Arc<dyn PushTransport>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                config,
                transport,
                state: Mutex::new(ChannelState {
                    status: ConnectionStatus::Disconnected,
                    generation: 0,
                    reconnect_attempts: 0,
                    closed_intentionally: false,
                    task: None,
                }),
                update_handlers: HandlerRegistry::new("update"),
                status_handlers: HandlerRegistry::new("status"),
            }),
        }
    }

    /// Open the connection to `url`, or to the configured URL when `None`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn connect(&self, url: Option<&str>) {
        let url = url.map_or_else(|| self.inner.config.url.clone(), str::to_owned);

        let (generation, changed) = {
            let mut state = self.inner.lock_state();
            let live = state.task.as_ref().is_some_and(|task| !task.is_finished());
            if live
                && matches!(
                    state.status,
                    ConnectionStatus::Connected | ConnectionStatus::Connecting
                )
            {
                tracing::debug!(status = ?state.status, "Realtime channel already active");
                return;
            }

            if let Some(task) = state.task.take() {
                task.abort();
            }
            state.generation += 1;
            state.reconnect_attempts = 0;
            state.closed_intentionally = false;
            let changed = state.status != ConnectionStatus::Connecting;
            state.status = ConnectionStatus::Connecting;

            let generation = state.generation;
            state.task = Some(tokio::spawn(run_connection(
                Arc::clone(&self.inner),
                url,
                generation,
            )));
            (generation, changed)
        };

        tracing::debug!(generation, "Realtime connection task started");
        if changed {
            self.inner.status_handlers.dispatch(&ConnectionStatus::Connecting);
        }
    }

    /// Close the connection; no reconnect follows
    pub fn disconnect(&self) {
        let (task, changed) = {
            let mut state = self.inner.lock_state();
            state.closed_intentionally = true;
            state.generation += 1;
            let changed = state.status != ConnectionStatus::Disconnected;
            state.status = ConnectionStatus::Disconnected;
            (state.task.take(), changed)
        };

        if let Some(task) = task {
            task.abort();
        }
        tracing::info!("Realtime channel disconnected");
        if changed {
            self.inner.status_handlers.dispatch(&ConnectionStatus::Disconnected);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.lock_state().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Consecutive reconnects since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock_state().reconnect_attempts
    }

    /// Register a handler for every decoded task update
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TaskUpdate) + Send + Sync + 'static,
    {
        let id = self.inner.update_handlers.add(Arc::new(handler));
        Subscription {
            channel: Arc::downgrade(&self.inner),
            id,
            kind: HandlerKind::Update,
        }
    }

    /// Register a handler for status changes
    pub fn subscribe_to_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        let id = self.inner.status_handlers.add(Arc::new(handler));
        Subscription {
            channel: Arc::downgrade(&self.inner),
            id,
            kind: HandlerKind::Status,
        }
    }
}
