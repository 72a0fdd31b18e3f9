//! Adapters for the [`crate::ports::Broker`] port.

mod inmemory;
mod redis;

pub use inmemory::{InMemoryBroker, InMemoryConsumer};
pub use redis::{RedisBroker, RedisConsumer};
