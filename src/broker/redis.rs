//! Redis pub/sub-backed broker: the production [`Broker`] adapter.
//!
//! Publishing uses a plain multiplexed connection, while each subscription
//! gets its own dedicated pub/sub connection so a slow consumer can't stall
//! others.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;

use crate::config::RedisSettings;
use crate::error::BrokerError;
use crate::ports::{Broker, Consumer};

/// Redis adapter for [`Broker`].
#[derive(Clone)]
pub struct RedisBroker {
    manager: ConnectionManager,
    client: redis::Client,
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker").finish_non_exhaustive()
    }
}

impl RedisBroker {
    /// Connect to Redis using the given settings.
    ///
    /// # Errors
    /// Returns [`BrokerError::SubscribeFailed`] if the connection could not
    /// be established.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, BrokerError> {
        let client = redis::Client::open(settings.connection_url())
            .map_err(|e| BrokerError::SubscribeFailed(Box::new(e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| BrokerError::SubscribeFailed(Box::new(e)))?;
        Ok(Self { manager, client })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    type Consumer = RedisConsumer;

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut conn = self.manager.clone();
        let _: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| BrokerError::PublishFailed(Box::new(e)))?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Self::Consumer, BrokerError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::SubscribeFailed(Box::new(e)))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| BrokerError::SubscribeFailed(Box::new(e)))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let payload = msg.get_payload_bytes().to_vec();
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });

        Ok(RedisConsumer { rx })
    }
}

/// Redis pub/sub consumer handle.
///
/// The forwarding task owns the dedicated pub/sub connection; dropping this
/// handle drops the channel's sender-side reference and the task exits on
/// its next send.
#[derive(Debug)]
pub struct RedisConsumer {
    rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl Consumer for RedisConsumer {
    async fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, BrokerError> {
        Ok(tokio::time::timeout(timeout, self.rx.recv())
            .await
            .unwrap_or(None))
    }

    async fn unsubscribe(&mut self) -> Result<(), BrokerError> {
        self.rx.close();
        Ok(())
    }
}
