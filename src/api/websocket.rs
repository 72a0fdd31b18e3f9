//! `GET /v1/ws`: the subscribe/unsubscribe control protocol and the
//! streaming upload sub-protocol.
//!
//! One connection owns a [`crate::subscription::SubscriptionManager`], reads
//! JSON control frames in a loop, and on `"subscribe"` enqueues the ingest
//! job and opens the subscription as independent siblings, not nested calls
//! — so an unsubscribe tears down this connection's egress without
//! cancelling ingest work already in flight. A request the ingest queue
//! rejects (bad `replay_rate`, zero `granularity` on a kline subscription,
//! ...) never reaches `manager.subscribe`; the client gets a bad-payload ack
//! instead of a success ack for a subscription that was never wired up.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::AppState;
use super::upload::UploadRecord;
use crate::ports::Broker;
use crate::subscription::{ClientSink, ClientWriteError, SubscriptionManager};
use crate::types::{SubscriptionRequest, SubscriptionResponse, SubscriptionType};

/// Upgrade to a websocket and hand the connection off to its own
/// subscription manager.
pub async fn ws_handler<B>(ws: WebSocketUpgrade, State(state): State<Arc<AppState<B>>>) -> impl IntoResponse
where
    B: Broker + Clone + 'static,
    B::Consumer: 'static,
{
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Wraps the write half of a websocket behind a lock so the control path
/// (acks) and the broker fan-out can share one connection without
/// interleaving frames.
struct AxumSink {
    inner: Mutex<SplitSink<WebSocket, Message>>,
}

impl AxumSink {
    fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { inner: Mutex::new(sink) }
    }
}

#[async_trait]
impl ClientSink for AxumSink {
    async fn send_text(&self, text: String) -> Result<(), ClientWriteError> {
        self.inner
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|_| ClientWriteError)
    }
}

async fn handle_socket<B>(socket: WebSocket, state: Arc<AppState<B>>)
where
    B: Broker + Clone + 'static,
    B::Consumer: 'static,
{
    let (sink, mut receiver) = socket.split();
    let sink = Arc::new(AxumSink::new(sink));
    let manager = SubscriptionManager::new(state.broker.clone(), Arc::clone(&sink));

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(req) = serde_json::from_str::<SubscriptionRequest>(&text) else {
            send_bad_payload(&sink).await;
            continue;
        };

        match req.kind {
            SubscriptionType::Subscribe => {
                let req = req.generate();
                let ready = std::path::Path::new(&req.filename).exists()
                    || run_upload_stream(&mut receiver, sink.as_ref(), &req).await;
                if !ready {
                    continue;
                }
                if state.ingest.put(req.clone(), &state.error_tx).await {
                    manager.subscribe(req).await;
                } else {
                    send_bad_payload(&sink).await;
                }
            }
            SubscriptionType::Unsubscribe => {
                state.ingest.remove(&req.id).await;
                manager.unsubscribe(&req.id).await;
            }
        }
    }

    debug_closing();
}

fn debug_closing() {
    tracing::debug!("closing websocket connection");
}

async fn send_bad_payload(sink: &AxumSink) {
    let Ok(text) = serde_json::to_string(&SubscriptionResponse::bad_payload()) else {
        return;
    };
    if sink.send_text(text).await.is_err() {
        warn!("failed to send bad-payload acknowledgement");
    }
}

/// Drive the streaming upload sub-protocol for a subscribe request whose
/// file does not exist yet. Returns `true` once the file is ready to be
/// scanned, `false` if the client cancelled, disconnected, or a write
/// failed.
///
/// The original never wires a caller that supplies a declared size ahead
/// of time, so the `size` field of the server's `UploadHeader` frame is
/// sent as `0` and completion is instead signalled by the client sending a
/// zero-length binary frame, rather than by matching cumulative bytes
/// against a known total.
async fn run_upload_stream(receiver: &mut SplitStream<WebSocket>, sink: &AxumSink, req: &SubscriptionRequest) -> bool {
    let header = UploadRecord {
        id: req.id.clone(),
        filepath: req.filename.clone(),
        size: 0,
    };
    let Ok(text) = serde_json::to_string(&header) else {
        return false;
    };
    if sink.send_text(text).await.is_err() {
        return false;
    }

    let Ok(mut file) = tokio::fs::File::create(&req.filename).await else {
        warn!(filename = %req.filename, "failed to create upload destination");
        return false;
    };

    loop {
        let Some(Ok(message)) = receiver.next().await else {
            let _ = tokio::fs::remove_file(&req.filename).await;
            return false;
        };

        match message {
            Message::Binary(chunk) if chunk.is_empty() => return true,
            Message::Binary(chunk) => {
                if file.write_all(&chunk).await.is_err() || sink.send_text("NEXT".to_string()).await.is_err() {
                    let _ = tokio::fs::remove_file(&req.filename).await;
                    return false;
                }
            }
            Message::Text(text) if text == "CANCEL" => {
                let _ = tokio::fs::remove_file(&req.filename).await;
                return false;
            }
            Message::Close(_) => {
                let _ = tokio::fs::remove_file(&req.filename).await;
                return false;
            }
            _ => {}
        }
    }
}
