use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// String key-value persistence, the shape of browser-style local storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be stored.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear(&self, key: &str) -> Result<(), StorageError>;
}

/// Simple in-memory store for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds a store pre-populated with one entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut guard) = store.entries.lock() {
            guard.insert(key.to_string(), value.to_string());
        }
        store
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Bundles the storage backends behind trait objects for easy swapping.
#[derive(Clone)]
pub struct Storage {
    pub kv: Arc<dyn KeyValueStore>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_sets_reads_and_clears() {
        let store = InMemoryKeyValueStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));

        store.clear("k").await.unwrap();
        store.clear("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = InMemoryKeyValueStore::with_entry("k", "v");
        let other = store.clone();
        other.set("k2", "v2").await.unwrap();
        assert_eq!(store.get("k2").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
