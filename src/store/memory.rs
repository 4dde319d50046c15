//! In-memory key-value backend with an optional byte capacity.
//!
//! Used by unit tests and as a stand-in backend; the capacity bound models a
//! quota-limited substrate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KeyValueStore, StoreError};

/// HashMap-backed store. Capacity counts key + value bytes across all entries.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
    set_attempts: AtomicUsize,
}

impl MemoryStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `capacity` bytes are held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Total number of `set` calls, including rejected ones.
    pub fn set_attempts(&self) -> usize {
        self.set_attempts.load(Ordering::SeqCst)
    }

    fn usage(data: &HashMap<String, String>) -> usize {
        data.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self
            .data
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_attempts.fetch_add(1, Ordering::SeqCst);
        let mut data = self
            .data
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        if let Some(capacity) = self.capacity {
            let existing = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let projected = Self::usage(&data) - existing + key.len() + value.len();
            if projected > capacity {
                return Err(StoreError::QuotaExceeded);
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_remove() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let store = MemoryStore::with_capacity(10);
        store.set("a", "12345").await.unwrap();
        let err = store.set("b", "123456789").await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded));
        // Overwriting an existing key within capacity still works.
        store.set("a", "123").await.unwrap();
    }
}
