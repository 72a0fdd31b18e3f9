//! Broker port: the pub/sub fabric events are fanned out over.
//!
//! Defines the contract for publishing replay events to topic subscribers
//! and for consuming them back out: publish/subscribe/receive-with-timeout.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

// ═══════════════════════════════════════════════════════════════════════════════
// BROKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for publishing to, and subscribing from, the event fan-out fabric.
///
/// # Topics
///
/// Each subscription publishes to (and is consumed from) a topic scoped to
/// its own `request_id` — there is no cross-subscription sharing.
#[async_trait]
pub trait Broker: Send + Sync {
    /// The consumer handle returned by [`Broker::subscribe`].
    type Consumer: Consumer;

    /// Publish raw bytes to a topic.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the broker rejects the publish.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Subscribe to a topic, returning a handle that receives what is
    /// published to it from this point forward.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the subscription could not be established.
    async fn subscribe(&self, topic: &str) -> Result<Self::Consumer, BrokerError>;
}

#[async_trait]
impl<B: Broker + ?Sized> Broker for std::sync::Arc<B> {
    type Consumer = B::Consumer;

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        (**self).publish(topic, payload).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Self::Consumer, BrokerError> {
        (**self).subscribe(topic).await
    }
}

/// A live subscription to one topic.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Wait up to `timeout` for the next message.
    ///
    /// Returns `Ok(None)` on a timeout with no message delivered — this is
    /// the expected steady-state return when a subscription is idle between
    /// events, not an error.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the underlying connection failed.
    async fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, BrokerError>;

    /// Tear down this subscription.
    ///
    /// # Errors
    /// Returns [`BrokerError`] if the broker could not be reached to
    /// unsubscribe. Callers should treat this as best-effort cleanup.
    async fn unsubscribe(&mut self) -> Result<(), BrokerError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock implementations for testing.

    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::{BrokerError, Consumer, async_trait};

    /// In-process broker for tests: topics are `mpsc` channels keyed by name.
    #[derive(Debug, Clone, Default)]
    pub struct MockBroker {
        topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>>,
    }

    impl MockBroker {
        /// Create an empty mock broker.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl super::Broker for MockBroker {
        type Consumer = MockConsumer;

        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
            let topics = self.topics.lock();
            if let Some(tx) = topics.get(topic) {
                // A closed receiver (subscriber already unsubscribed) is not
                // a publish failure; nobody is listening.
                let _ = tx.send(payload.to_vec());
            }
            Ok(())
        }

        async fn subscribe(&self, topic: &str) -> Result<Self::Consumer, BrokerError> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.topics.lock().insert(topic.to_string(), tx);
            Ok(MockConsumer {
                topic: topic.to_string(),
                topics: Arc::clone(&self.topics),
                rx,
            })
        }
    }

    /// Mock consumer handle backed by an `mpsc` receiver.
    #[derive(Debug)]
    pub struct MockConsumer {
        topic: String,
        topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    #[async_trait]
    impl Consumer for MockConsumer {
        async fn receive_timeout(
            &mut self,
            timeout: Duration,
        ) -> Result<Option<Vec<u8>>, BrokerError> {
            Ok(tokio::time::timeout(timeout, self.rx.recv())
                .await
                .unwrap_or(None))
        }

        async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
            self.topics.lock().remove(&self.topic);
            self.rx.close();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::mocks::MockBroker;
    use super::*;

    #[tokio::test]
    async fn subscribe_then_publish_delivers_payload() {
        let broker = MockBroker::new();
        let mut consumer = broker.subscribe("topic-a").await.unwrap();

        broker.publish("topic-a", b"hello").await.unwrap();

        let received = consumer
            .receive_timeout(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(received, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn receive_timeout_returns_none_when_idle() {
        let broker = MockBroker::new();
        let mut consumer = broker.subscribe("topic-b").await.unwrap();

        let received = consumer
            .receive_timeout(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn publish_with_no_subscriber_does_not_error() {
        let broker = MockBroker::new();
        assert!(broker.publish("nobody-listening", b"x").await.is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_stops_further_delivery() {
        let broker = MockBroker::new();
        let mut consumer = broker.subscribe("topic-c").await.unwrap();
        consumer.unsubscribe().await.unwrap();

        broker.publish("topic-c", b"too-late").await.unwrap();
        let received = consumer
            .receive_timeout(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(received, None);
    }
}
