//! Per-connection subscription manager.
//!
//! A `topics` map and a `consumers` map, each guarded by its own RW-lock,
//! plus a write-locked handle to the underlying client connection so the
//! control path (subscribe/unsubscribe acks) and the broker fan-out can
//! share it without interleaving writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ports::{Broker, Consumer};
use crate::types::{EofFrame, Kline, SubscriptionName, SubscriptionRequest, SubscriptionResponse, Trade};

/// How long the consumer listener blocks on the broker before looping again
/// to re-check its cancellation token.
const CONSUMER_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Abstraction over "write one JSON frame to this client connection",
/// letting the manager's dispatch logic be exercised without a real
/// websocket.
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Send one text frame. Errors are treated as a dead connection.
    async fn send_text(&self, text: String) -> Result<(), ClientWriteError>;
}

/// The client connection could not be written to.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("client write failed")]
pub struct ClientWriteError;

struct ConsumerHandle {
    cancel: CancellationToken,
}

/// Owns the subscribe/unsubscribe state and broker fan-out for one client
/// connection.
pub struct SubscriptionManager<B, S> {
    topics: RwLock<HashMap<String, SubscriptionRequest>>,
    consumers: RwLock<HashMap<String, ConsumerHandle>>,
    broker: B,
    sink: Arc<S>,
}

impl<B, S> SubscriptionManager<B, S>
where
    B: Broker + 'static,
    B::Consumer: 'static,
    S: ClientSink + 'static,
{
    /// Create a manager for one freshly-accepted connection.
    pub fn new(broker: B, sink: Arc<S>) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            broker,
            sink,
        }
    }

    /// Subscribe to `req.id`'s topic (idempotent: a repeat subscribe for an
    /// already-open topic just re-sends the acknowledgement, matching the Go
    /// original's unconditional `SendData` at the end of `Subscribe`).
    pub async fn subscribe(&self, req: SubscriptionRequest) {
        let already_open = self.topics.read().await.contains_key(&req.id);

        if !already_open {
            match self.broker.subscribe(&req.id).await {
                Ok(consumer) => {
                    self.topics.write().await.insert(req.id.clone(), req.clone());
                    let cancel = CancellationToken::new();
                    self.consumers
                        .write()
                        .await
                        .insert(req.id.clone(), ConsumerHandle { cancel: cancel.clone() });
                    tokio::spawn(run_consumer(consumer, req.name, Arc::clone(&self.sink), cancel));
                }
                Err(error) => {
                    warn!(request_id = %req.id, %error, "failed to subscribe to broker topic");
                    return;
                }
            }
        }

        send_ack(&self.sink, &SubscriptionResponse::subscribed(&req)).await;
    }

    /// Tear down an existing subscription. A no-op (no acknowledgement) if
    /// `request_id` is not currently subscribed.
    ///
    /// In-flight ingest work for this subscription is not cancelled here —
    /// only this connection's egress is torn down. The ingest job runs to
    /// completion; its publishes simply find no subscriber.
    pub async fn unsubscribe(&self, request_id: &str) {
        if self.topics.write().await.remove(request_id).is_none() {
            return;
        }

        if let Some(handle) = self.consumers.write().await.remove(request_id) {
            handle.cancel.cancel();
        }

        send_ack(&self.sink, &SubscriptionResponse::unsubscribed(request_id)).await;
    }

    /// Number of currently-open subscriptions on this connection.
    #[must_use]
    pub async fn active_count(&self) -> usize {
        self.topics.read().await.len()
    }
}

async fn send_ack<S: ClientSink + ?Sized>(sink: &S, ack: &SubscriptionResponse) {
    match serde_json::to_string(ack) {
        Ok(text) => {
            if sink.send_text(text).await.is_err() {
                warn!(request_id = %ack.id, "failed to deliver subscription acknowledgement");
            }
        }
        Err(error) => warn!(%error, "failed to encode subscription acknowledgement"),
    }
}

/// Listener loop for one subscription's broker consumer.
async fn run_consumer<C, S>(mut consumer: C, name: SubscriptionName, sink: Arc<S>, cancel: CancellationToken)
where
    C: Consumer,
    S: ClientSink,
{
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                let _ = consumer.unsubscribe().await;
                return;
            }

            received = consumer.receive_timeout(CONSUMER_RECEIVE_TIMEOUT) => {
                match received {
                    Ok(Some(bytes)) => {
                        if !forward(&bytes, name, sink.as_ref()).await {
                            // A dead client connection also tears down the
                            // broker subscription so the listener task doesn't
                            // leak behind it.
                            let _ = consumer.unsubscribe().await;
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => warn!(%error, "broker receive failed, retrying"),
                }
            }
        }
    }
}

/// Decode one broker payload by the subscription's declared shape and
/// forward it to the client. Returns `false` only on a client write failure;
/// an undecodable payload is logged and skipped, not treated as fatal.
async fn forward<S: ClientSink + ?Sized>(bytes: &[u8], name: SubscriptionName, sink: &S) -> bool {
    let text = if let Ok(eof) = serde_json::from_slice::<EofFrame>(bytes) {
        serde_json::to_string(&eof)
    } else {
        match name {
            SubscriptionName::Order => {
                serde_json::from_slice::<Trade>(bytes).and_then(|trade| serde_json::to_string(&trade))
            }
            SubscriptionName::Kline => {
                serde_json::from_slice::<Kline>(bytes).and_then(|kline| serde_json::to_string(&kline))
            }
        }
    };

    let Ok(text) = text else {
        warn!("failed to decode published payload, skipping");
        return true;
    };

    if sink.send_text(text).await.is_err() {
        return false;
    }
    true
}
