//! Keyed state stores.
//!
//! Each actor owns exactly one key, so the store only needs whole-value
//! reads and writes; there are no cross-key transactions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ballotbox_common::AppResult;
use tokio::sync::RwLock;

/// A string-valued key/value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value at `key`.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the value at `key`.
    async fn put(&self, key: &str, value: String) -> AppResult<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Shared handle to a store implementation.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Process-local store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> AppResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
