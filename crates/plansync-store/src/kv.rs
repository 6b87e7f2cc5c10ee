//! Key-value backends
//!
//! The local store is a single flat key space of JSON strings. Each `set`
//! replaces one key atomically: either the whole new value is stored or the
//! old one is kept.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;

/// Flat key-value space
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace a value
    ///
    /// # Errors
    /// `StoreError::QuotaExceeded` if the store would grow past its limit;
    /// the previous value is kept.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove a value (no-op when absent)
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently present
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-process store, optionally size-limited
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    /// Create unlimited store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store limited to `quota_bytes` (keys + values)
    #[inline]
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Bytes currently used (keys + values)
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum()
    }
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        if let Some(limit) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let required = others + entry_size(key, &value);
            if required > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    required,
                    limit,
                });
            }
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set("a", "1".to_string()).await.unwrap();
        store.set("b", "2".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn quota_rejects_without_partial_write() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345".to_string()).await.unwrap();
        assert_eq!(store.used_bytes(), 6);

        let err = store.set("k", "1234567890".to_string()).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("12345"));

        // Replacing a value only counts the new size
        store.set("k", "123456789".to_string()).await.unwrap();
        assert_eq!(store.used_bytes(), 10);
    }
}
