//! Writable response channel between the orchestrator and the HTTP adapter
//!
//! The orchestrator writes a response head (JSON or stream start) followed by
//! stream frames; the adapter owns the receiving half. Once the receiver is
//! gone every write is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Message delivered to the HTTP adapter
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Complete JSON response
    Json { status: StatusCode, body: Value },
    /// Switch the response to a server-sent event stream
    StreamStart,
    /// One stream frame
    Frame(SseFrame),
    /// Stop applying the response timeout
    DisableTimeout,
}

/// Server-sent event frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `data: <json>` frame
    Data(String),
    /// `: heartbeat` comment frame
    KeepAlive,
    /// `data: [DONE]` terminator
    Done,
}

/// Receiving half consumed by the HTTP adapter
pub type ResponseReceiver = mpsc::Receiver<Outbound>;

#[derive(Debug)]
struct ChannelState {
    opened: Instant,
    last_write_ms: AtomicU64,
    headers_sent: AtomicBool,
    closed: AtomicBool,
}

/// Cloneable writer shared by the dispatch path and the heartbeat task
#[derive(Debug, Clone)]
pub struct ResponseChannel {
    sender: mpsc::Sender<Outbound>,
    state: Arc<ChannelState>,
}

impl ResponseChannel {
    pub fn new(capacity: usize) -> (Self, ResponseReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let channel = Self {
            sender,
            state: Arc::new(ChannelState {
                opened: Instant::now(),
                last_write_ms: AtomicU64::new(0),
                headers_sent: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        };
        (channel, receiver)
    }

    /// Whether a response head (JSON or stream start) has been written
    pub fn headers_sent(&self) -> bool {
        self.state.headers_sent.load(Ordering::Acquire)
    }

    /// Whether the caller has gone away
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    /// Time since the last data frame, or since the channel opened
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.state.last_write_ms.load(Ordering::Acquire));
        self.state.opened.elapsed().saturating_sub(last)
    }

    /// Mark the response as an SSE stream
    pub async fn start_stream(&self) {
        if self.state.headers_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        self.touch();
        self.send(Outbound::StreamStart).await;
    }

    /// Write a complete JSON response; ignored once a head was sent
    pub async fn send_json<T: Serialize>(&self, status: StatusCode, body: &T) {
        if self.state.headers_sent.swap(true, Ordering::AcqRel) {
            tracing::debug!(status = status.as_u16(), "response already started, dropping JSON body");
            return;
        }

        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response body");
                serde_json::json!({
                    "error": {
                        "message": "an internal error occurred",
                        "type": "internal_error",
                        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }
                })
            }
        };

        self.send(Outbound::Json { status, body }).await;
    }

    /// Write one `data:` frame carrying `value` as JSON
    pub async fn write_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string(value) {
            Ok(data) => {
                self.touch();
                self.send(Outbound::Frame(SseFrame::Data(data))).await;
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize stream frame"),
        }
    }

    /// Write the `[DONE]` terminator
    pub async fn write_done(&self) {
        self.touch();
        self.send(Outbound::Frame(SseFrame::Done)).await;
    }

    /// Write a heartbeat comment; does not count as activity
    pub async fn write_keep_alive(&self) {
        self.send(Outbound::Frame(SseFrame::KeepAlive)).await;
    }

    /// Tell the adapter to stop timing out this response
    pub async fn disable_timeout(&self) {
        self.send(Outbound::DisableTimeout).await;
    }

    fn touch(&self) {
        let elapsed = u64::try_from(self.state.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.state.last_write_ms.store(elapsed, Ordering::Release);
    }

    async fn send(&self, message: Outbound) {
        if self.state.closed.load(Ordering::Acquire) {
            return;
        }

        if self.sender.send(message).await.is_err() && !self.state.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("client disconnected, discarding further writes");
        }
    }
}
