//! Event cache port: the durable-enough store behind scheduled replay
//! payloads.
//!
//! Events are written once (at ingest time), read exactly once (by the
//! publisher, right before emission) and then deleted. There is no update
//! path and no secondary index — a plain key/value store is sufficient.

use async_trait::async_trait;

use crate::error::CacheError;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Port for the event payload cache.
///
/// Keys are [`crate::types::EventId::to_key`] strings; values are
/// [`crate::types::CachedPayload::encode`] bytes. Implementations must be
/// safe to share across the ingest and publisher actors.
#[async_trait]
pub trait EventCache: Send + Sync {
    /// Store a batch of key/value pairs in one round trip, mirroring a
    /// Redis `MSET`.
    ///
    /// # Errors
    /// Returns [`CacheError`] if the batch could not be written.
    async fn put_batch(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), CacheError>;

    /// Fetch one value by key.
    ///
    /// Returns `Ok(None)` on a miss; a miss for a key the scheduler still
    /// believes is live indicates the record was already consumed or never
    /// written, and callers should treat it as "nothing to publish", not an
    /// error.
    ///
    /// # Errors
    /// Returns [`CacheError`] if the cache could not be reached.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Delete one key, once its payload has been published.
    ///
    /// # Errors
    /// Returns [`CacheError`] if the cache could not be reached. Deleting an
    /// already-absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every cached payload.
    ///
    /// Called once at startup so the cache starts empty on every process
    /// restart, clearing anything orphaned by a previous run's crash.
    ///
    /// # Errors
    /// Returns [`CacheError`] if the cache could not be reached.
    async fn flush_all(&self) -> Result<(), CacheError>;
}

#[async_trait]
impl<C: EventCache + ?Sized> EventCache for std::sync::Arc<C> {
    async fn put_batch(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        (**self).put_batch(pairs).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key).await
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        (**self).flush_all().await
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock implementations for testing.

    use std::collections::HashMap;
    use std::sync::RwLock;

    use super::{CacheError, EventCache, async_trait};

    /// In-memory event cache for tests, backed by a plain map.
    #[derive(Debug, Default)]
    pub struct MockEventCache {
        entries: RwLock<HashMap<String, Vec<u8>>>,
    }

    impl MockEventCache {
        /// Create an empty mock cache.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of entries currently cached.
        #[must_use]
        pub fn len(&self) -> usize {
            self.entries.read().expect("lock poisoned").len()
        }

        /// Whether the cache is empty.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl EventCache for MockEventCache {
        async fn put_batch(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
            let mut entries = self.entries.write().expect("lock poisoned");
            entries.extend(pairs);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Ok(self.entries.read().expect("lock poisoned").get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.entries.write().expect("lock poisoned").remove(key);
            Ok(())
        }

        async fn flush_all(&self) -> Result<(), CacheError> {
            self.entries.write().expect("lock poisoned").clear();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockEventCache;
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = MockEventCache::new();
        cache
            .put_batch(vec![("k1".into(), b"v1".to_vec())])
            .await
            .unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn get_miss_returns_none() {
        let cache = MockEventCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = MockEventCache::new();
        cache
            .put_batch(vec![("k1".into(), b"v1".to_vec())])
            .await
            .unwrap();
        cache.delete("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn flush_all_clears_everything() {
        let cache = MockEventCache::new();
        cache
            .put_batch(vec![
                ("k1".into(), b"v1".to_vec()),
                ("k2".into(), b"v2".to_vec()),
            ])
            .await
            .unwrap();
        cache.flush_all().await.unwrap();
        assert!(cache.is_empty());
    }
}
