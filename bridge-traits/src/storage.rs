//! Durable Storage Abstraction
//!
//! Provides a platform-agnostic string key/value store that survives process
//! restarts.

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value storage trait
///
/// Abstracts platform-specific persistent storage:
/// - Desktop: SQLite-backed table (see `bridge-desktop`)
/// - Web: localStorage / IndexedDB
/// - Mobile: SharedPreferences / UserDefaults
///
/// Stores have an implicit size limit. When a write does not fit,
/// implementations must return
/// [`BridgeError::QuotaExceeded`](crate::error::BridgeError::QuotaExceeded).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::DurableStore;
///
/// async fn save_snapshot(store: &dyn DurableStore, json: &str) -> Result<()> {
///     store.set("offline_fallback_queue", json).await
/// }
/// ```
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Retrieve a value, `Ok(None)` if the key doesn't exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
