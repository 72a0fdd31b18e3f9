//! Redis-backed event cache: the production [`EventCache`] adapter.
//!
//! Uses the `redis` crate's `ConnectionManager`, which reconnects
//! transparently on connection loss, so the adapter itself stays stateless
//! beyond holding the manager handle.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::config::RedisSettings;
use crate::error::CacheError;
use crate::ports::EventCache;

/// Redis adapter for [`EventCache`].
#[derive(Clone)]
pub struct RedisEventCache {
    manager: ConnectionManager,
}

impl std::fmt::Debug for RedisEventCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventCache").finish_non_exhaustive()
    }
}

impl RedisEventCache {
    /// Connect to Redis using the given settings.
    ///
    /// # Errors
    /// Returns [`CacheError::Unavailable`] if the connection could not be
    /// established.
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.connection_url())
            .map_err(|e| CacheError::Unavailable(Box::new(e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Unavailable(Box::new(e)))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl EventCache for RedisEventCache {
    async fn put_batch(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        let _: () = conn
            .mset(&pairs)
            .await
            .map_err(|e| CacheError::PutFailed(Box::new(e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| CacheError::Unavailable(Box::new(e)))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Unavailable(Box::new(e)))?;
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(Box::new(e)))
    }
}
