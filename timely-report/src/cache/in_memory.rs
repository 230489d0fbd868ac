//! In-memory cache store for tests and single-process use.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::CacheStore;
use crate::error::Result;

/// Cache store backed by process memory.
///
/// Cloning shares the underlying storage, so one store can back several
/// reports at once.
///
/// # Example
///
/// ```rust
/// use timely_report::cache::{CacheStore, InMemoryCacheStore};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = InMemoryCacheStore::new();
/// store.set("sales:orders:1:2", "42".to_string()).await.unwrap();
/// assert_eq!(store.get("sales:orders:1:2").await.unwrap().as_deref(), Some("42"));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    values: Arc<RwLock<HashMap<String, String>>>,
    hashes: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl InMemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flat keys plus hash fields stored.
    pub async fn len(&self) -> usize {
        let flat = self.values.read().await.len();
        let fields: usize = self.hashes.read().await.values().map(HashMap::len).sum();
        flat + fields
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes everything.
    pub async fn clear(&self) {
        self.values.write().await.clear();
        self.hashes.write().await.clear();
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    #[instrument(skip(self, value), fields(store = "in_memory"))]
    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .hashes
            .read()
            .await
            .get(hash_key)
            .and_then(|fields| fields.get(field))
            .cloned())
    }

    #[instrument(skip(self, value), fields(store = "in_memory"))]
    async fn hset(&self, hash_key: &str, field: &str, value: String) -> Result<()> {
        self.hashes
            .write()
            .await
            .entry(hash_key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    #[instrument(skip(self), fields(store = "in_memory"))]
    async fn delete_hash(&self, hash_key: &str) -> Result<usize> {
        let removed = self
            .hashes
            .write()
            .await
            .remove(hash_key)
            .map_or(0, |fields| fields.len());
        debug!(removed, "Deleted cache hash");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flat_and_hash_are_separate() {
        let store = InMemoryCacheStore::new();
        store.set("a", "1".to_string()).await.unwrap();
        store.hset("a", "f", "2".to_string()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.hget("a", "f").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.hget("a", "g").await.unwrap(), None);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_last_write_wins_and_clear() {
        let store = InMemoryCacheStore::new();
        let shared = store.clone();
        store.set("k", "1".to_string()).await.unwrap();
        shared.set("k", "2".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));

        store.clear().await;
        assert!(shared.is_empty().await);
        assert_eq!(store.delete_hash("missing").await.unwrap(), 0);
    }
}
