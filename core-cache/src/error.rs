//! # Cache Error Types

use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`GenericCache`](crate::GenericCache).
///
/// Misses and expiry are not errors. The type is `Clone` so a single
/// factory failure can be handed to every caller waiting on the same key.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The item alone is larger than the whole cache.
    #[error("Item '{key}' is {size_bytes} bytes, cache limit is {max_size_bytes} bytes")]
    CapacityExceeded {
        key: String,
        size_bytes: u64,
        max_size_bytes: u64,
    },

    /// The value could not be serialized for size estimation.
    #[error("Failed to serialize value for '{key}': {message}")]
    Serialization { key: String, message: String },

    /// An invalidation pattern did not compile.
    #[error("Invalid key pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The `get_or_set` factory failed; nothing was stored.
    #[error("Value factory failed: {0}")]
    Factory(Arc<anyhow::Error>),

    /// Configuration rejected by `CacheConfig::validate`.
    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

impl CacheError {
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, CacheError::CapacityExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
