//! Key-value persistence port and the identity-scoped accessor on top of it.
//!
//! The ledgers never touch a backend directly; they go through [`ScopedStore`],
//! which namespaces keys by the active user, treats corrupt stored values as
//! absence, and recovers once from quota failures before giving up.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::User;

/// Storage key stems. Scoped keys get a `_user_<uid>` suffix; global keys are
/// stored as-is.
pub mod keys {
    /// Scoped: the owner's current analysis record.
    pub const CURRENT_ANALYSIS: &str = "current_analysis";
    /// Scoped: the owner's bounded analysis history.
    pub const ANALYSIS_HISTORY: &str = "analysis_history";
    /// Scoped: the user's personal group list.
    pub const GROUPS: &str = "groups";
    /// Scoped: the user's synced profile.
    pub const PROFILE: &str = "profile";
    /// Global: invite code -> group registry.
    pub const GROUP_CODES: &str = "group_codes";
    /// Global: "{group_id}_{uid}" -> shared analysis snapshot.
    pub const SHARED_ANALYSES: &str = "shared_analyses";
}

/// Errors surfaced by storage backends.
#[derive(Debug)]
pub enum StoreError {
    /// The backend is out of space.
    QuotaExceeded,
    /// Any other backend failure.
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::QuotaExceeded => write!(f, "storage quota exceeded"),
            StoreError::Backend(msg) => write!(f, "storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistence port. String-in, string-out; callers own serialization.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Build the storage key for a user-scoped stem.
pub fn user_key(key: &str, uid: &str) -> String {
    format!("{}_user_{}", key, uid)
}

/// Identity-scoped storage accessor.
///
/// All scoped operations are no-ops when no user is active: reads return
/// `None`, writes return `false`. Nothing here panics or propagates a backend
/// error to the caller; failures are logged and absorbed.
#[derive(Clone)]
pub struct ScopedStore {
    store: Arc<dyn KeyValueStore>,
    user: Option<User>,
}

impl ScopedStore {
    pub fn new(store: Arc<dyn KeyValueStore>, user: Option<User>) -> Self {
        Self { store, user }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn uid(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.uid.as_str())
    }

    fn scoped_key(&self, key: &str) -> Option<String> {
        self.uid().map(|uid| user_key(key, uid))
    }

    /// Read and deserialize a scoped value. Corrupt entries are deleted and
    /// treated as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let scoped = self.scoped_key(key)?;
        self.get_key_json(&scoped).await
    }

    /// Write a scoped value. On a quota failure, discards the analysis history
    /// (keeping the current record) and retries exactly once.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let Some(scoped) = self.scoped_key(key) else {
            return false;
        };
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("Failed to serialize value for {}: {}", scoped, err);
                return false;
            }
        };

        match self.store.set(&scoped, &payload).await {
            Ok(()) => true,
            Err(StoreError::QuotaExceeded) => {
                tracing::warn!("Quota exceeded writing {}, discarding history", scoped);
                self.discard_history().await;
                match self.store.set(&scoped, &payload).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::error!("Write of {} still failed after cleanup: {}", scoped, err);
                        false
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Failed to write {}: {}", scoped, err);
                false
            }
        }
    }

    /// Remove a scoped key. No-op without an active user.
    pub async fn remove(&self, key: &str) {
        if let Some(scoped) = self.scoped_key(key) {
            self.remove_key(&scoped).await;
        }
    }

    /// Read a global (or explicitly scoped) key, with the same corrupt-entry
    /// handling as [`Self::get_json`].
    pub async fn get_key_json<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        let raw = match self.store.get(full_key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!("Failed to read {}: {}", full_key, err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("Corrupt entry at {}, discarding: {}", full_key, err);
                self.remove_key(full_key).await;
                None
            }
        }
    }

    /// Write a global (or explicitly scoped) key. Single attempt; quota
    /// recovery only applies to the active identity's own writes.
    pub async fn set_key_json<T: Serialize>(&self, full_key: &str, value: &T) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("Failed to serialize value for {}: {}", full_key, err);
                return false;
            }
        };
        match self.store.set(full_key, &payload).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Failed to write {}: {}", full_key, err);
                false
            }
        }
    }

    /// Remove an exact key.
    pub async fn remove_key(&self, full_key: &str) {
        if let Err(err) = self.store.remove(full_key).await {
            tracing::warn!("Failed to remove {}: {}", full_key, err);
        }
    }

    async fn discard_history(&self) {
        if let Some(history) = self.scoped_key(keys::ANALYSIS_HISTORY) {
            self.remove_key(&history).await;
        }
    }
}
