// Outbound socket seam: a sink port, the axum WebSocket adapter behind it,
// and the best-effort send helpers every registry goes through.

use async_trait::async_trait;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

// Send-side failure: the peer is gone or the frame could not be written.
#[derive(Debug)]
pub struct SinkError;

// Port for the write half of a client connection, shareable across tasks.
#[async_trait]
pub trait WireSink: Send + Sync {
    async fn send_text(&self, text: Utf8Bytes) -> Result<(), SinkError>;
}

pub type SharedSink = Arc<dyn WireSink>;

/// Wraps the write half of an accepted WebSocket so registries can send to
/// it after releasing their own locks, without owning the read loop.
pub struct WsSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn shared(sink: SplitSink<WebSocket, Message>) -> SharedSink {
        Arc::new(Self { sink: Mutex::new(sink) })
    }
}

#[async_trait]
impl WireSink for WsSink {
    async fn send_text(&self, text: Utf8Bytes) -> Result<(), SinkError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await.map_err(|_| SinkError)
    }
}

// Serialize and send, reporting failures to the caller. The lobby broadcast
// uses the result to spot stale sockets.
pub async fn send_json<T: Serialize>(sink: &SharedSink, payload: &T) -> Result<(), SinkError> {
    let text = match serde_json::to_string(payload) {
        Ok(text) => text,
        Err(e) => {
            error!(error = ?e, "failed to serialize outbound frame");
            return Err(SinkError);
        }
    };
    sink.send_text(Utf8Bytes::from(text)).await
}

/// Best-effort send: failures mean the peer is gone and are swallowed.
pub async fn safe_send<T: Serialize>(sink: &SharedSink, payload: &T) {
    let _ = send_json(sink, payload).await;
}
