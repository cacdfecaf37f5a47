//! # Push Transport
//!
//! Opens the long-lived connection that carries server-pushed task updates
//! and turns it into a stream of raw text messages, one per update.
//!
//! ## Wire Format
//!
//! The body is newline-delimited JSON. Server-sent-event framing is also
//! accepted: `data: ` prefixes are stripped, `:` comments and other SSE
//! fields (`event:`, `id:`, `retry:`) are skipped. Lines may be split across
//! network chunks; incomplete lines are buffered until their newline arrives.
//!
//! ## Schemes
//!
//! - `ws://`, `wss://`: [`WsPushTransport`]. Each text or binary frame holds
//!   one or more NDJSON lines; a close frame ends the stream
//! - `http://`, `https://`: [`HttpPushTransport`], a streaming GET

use crate::shared::error::SyncError;
use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Raw messages of one open connection. Ends when the server closes it.
pub type PushStream = BoxStream<'static, Result<String, SyncError>>;

/// Opens push connections
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, url: &str) -> Result<PushStream, SyncError>;
}

/// Connection flavour selected by the push URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushScheme {
    WebSocket,
    Http,
}

impl PushScheme {
    pub fn from_url(url: &str) -> Result<Self, SyncError> {
        let parsed = Url::parse(url)
            .map_err(|e| SyncError::connection(format!("invalid push url {}: {}", url, e)))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(Self::WebSocket),
            "http" | "https" => Ok(Self::Http),
            other => Err(SyncError::connection(format!(
                "unsupported push scheme {} in {}",
                other, url
            ))),
        }
    }
}

/// Splits a byte stream into messages
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Append `chunk` and return every message it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(message) = parse_line(&line[..newline_pos]) {
                messages.push(message);
            }
        }
        messages
    }

    /// Bytes received after the last newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<String> {
    let decoded = String::from_utf8_lossy(raw);
    let line = decoded.trim_end_matches('\r');

    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(data) = line.strip_prefix("data:") {
        return Some(data.strip_prefix(' ').unwrap_or(data).to_string());
    }
    if ["event:", "id:", "retry:"].iter().any(|field| line.starts_with(field)) {
        return None;
    }
    Some(line.to_string())
}

/// Streaming HTTP GET
#[derive(Debug, Clone, Default)]
pub struct HttpPushTransport {
    client: Client,
}

impl HttpPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn open(&self, url: &str) -> Result<PushStream, SyncError> {
        tracing::debug!(url, "Opening push stream");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/x-ndjson, text/event-stream")
            .send()
            .await
            .map_err(|e| SyncError::connection(format!("failed to open {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::http_status(
                status.as_u16(),
                format!("push subscription failed: {}", status),
            ));
        }

        let mut lines = LineBuffer::default();
        let messages = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => lines.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(SyncError::connection(format!("push stream broke: {}", e)))],
            })
            .flat_map(stream::iter);

        Ok(messages.boxed())
    }
}

/// WebSocket client
#[derive(Debug, Clone)]
pub struct WsPushTransport {
    connect_timeout: Duration,
}

impl Default for WsPushTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl WsPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn open(&self, url: &str) -> Result<PushStream, SyncError> {
        tracing::debug!(url, "Opening websocket");
        let request = url
            .into_client_request()
            .map_err(|e| SyncError::connection(format!("invalid push url {}: {}", url, e)))?;

        let socket = match tokio::time::timeout(self.connect_timeout, connect_async(request)).await {
            Ok(Ok((socket, _))) => socket,
            Ok(Err(WsError::Http(response))) => {
                return Err(SyncError::http_status(
                    response.status().as_u16(),
                    format!("push subscription failed: {}", response.status()),
                ));
            }
            Ok(Err(e)) => {
                return Err(SyncError::connection(format!("failed to open {}: {}", url, e)));
            }
            Err(_) => return Err(SyncError::Timeout(self.connect_timeout)),
        };

        let mut lines = LineBuffer::default();
        let messages = socket
            .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
            .map(move |frame| match frame {
                Ok(Message::Text(text)) => frame_lines(&mut lines, text.as_bytes()),
                Ok(Message::Binary(bytes)) => frame_lines(&mut lines, &bytes),
                Ok(_) => Vec::new(),
                Err(e) => vec![Err(SyncError::connection(format!("websocket broke: {}", e)))],
            })
            .flat_map(stream::iter);

        Ok(messages.boxed())
    }
}

// A frame is complete on its own, so its last line needs no trailing newline
fn frame_lines(lines: &mut LineBuffer, payload: &[u8]) -> Vec<Result<String, SyncError>> {
    let mut messages = lines.push(payload);
    if lines.pending() > 0 {
        messages.extend(lines.push(b"\n"));
    }
    messages.into_iter().map(Ok).collect()
}
