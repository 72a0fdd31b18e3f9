//! Adapters for the [`crate::ports::EventCache`] port.

mod memory;
mod redis;

pub use memory::InMemoryEventCache;
pub use redis::RedisEventCache;
