//! `DashMap`-backed in-process event cache.
//!
//! Used for tests and single-node operation without a Redis dependency. No
//! TTL: entries only ever go away via an explicit `Delete`.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::CacheError;
use crate::ports::EventCache;

/// In-memory adapter for [`EventCache`].
#[derive(Debug, Default)]
pub struct InMemoryEventCache {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryEventCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventCache for InMemoryEventCache {
    async fn put_batch(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        for (key, value) in pairs {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_batch_then_get_round_trips() {
        let cache = InMemoryEventCache::new();
        cache
            .put_batch(vec![
                ("a".into(), b"1".to_vec()),
                ("b".into(), b"2".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(cache.get("b").await.unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.get("c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = InMemoryEventCache::new();
        cache.delete("absent").await.unwrap();
        cache
            .put_batch(vec![("k".into(), b"v".to_vec())])
            .await
            .unwrap();
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn flush_all_removes_prior_run_state() {
        let cache = InMemoryEventCache::new();
        cache
            .put_batch(vec![("stale:0".into(), b"x".to_vec())])
            .await
            .unwrap();
        cache.flush_all().await.unwrap();
        assert_eq!(cache.get("stale:0").await.unwrap(), None);
    }
}
