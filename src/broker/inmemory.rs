//! In-process pub/sub broker.
//!
//! Used for tests and single-node operation without a Redis dependency.
//! Topics are plain `tokio::sync::broadcast` channels keyed by name; a
//! publish to a topic with no subscribers is a silent no-op, matching the
//! contract's "subscribers come and go independently of publishers" shape.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::BrokerError;
use crate::ports::{Broker, Consumer};

const CHANNEL_CAPACITY: usize = 1024;

/// In-process broker adapter.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Vec<u8>>>>>,
}

impl InMemoryBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    type Consumer = InMemoryConsumer;

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        // No subscriber is not a failure: `send` errors only when there are
        // zero receivers, which is the expected steady state between
        // subscriptions.
        let _ = self.sender_for(topic).send(payload.to_vec());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Self::Consumer, BrokerError> {
        let sender = self.sender_for(topic);
        Ok(InMemoryConsumer {
            receiver: sender.subscribe(),
        })
    }
}

/// In-process consumer handle.
#[derive(Debug)]
pub struct InMemoryConsumer {
    receiver: broadcast::Receiver<Vec<u8>>,
}

#[async_trait]
impl Consumer for InMemoryConsumer {
    async fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, BrokerError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Ok(payload)) => Ok(Some(payload)),
            // Timed out waiting, or the channel lagged/closed: either way
            // there's nothing new to deliver right now.
            Ok(Err(_)) | Err(_) => Ok(None),
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        // Dropping the receiver is sufficient; broadcast channels have no
        // explicit unsubscribe call.
        Ok(())
    }
}
