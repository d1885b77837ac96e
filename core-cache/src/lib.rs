//! # Core Cache
//!
//! [`GenericCache`] is the client's in-memory read-through cache for backend
//! data (event listings, media metadata, site settings).
//!
//! ## Features
//!
//! - **Bounded**: total estimated size (`len(key) + len(json(value))`) and
//!   entry count
//! - **TTL**: per entry, checked lazily on access and by a periodic sweep
//! - **Eviction**: lowest `access_count / (idle_ms + 1)` goes first
//! - **Singleflight**: concurrent misses on one key run the factory once
//! - **Statistics**: hits, misses, evictions, expirations, hit rate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_cache::{CacheConfig, GenericCache};
//! use std::time::Duration;
//!
//! let cache = GenericCache::new(
//!     CacheConfig::default()
//!         .with_max_items(500)
//!         .with_default_ttl(Duration::from_secs(120)),
//! )?;
//!
//! cache.set("settings:site", settings, None)?;
//! cache.invalidate_pattern_str("^events:")?;
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod stats;

pub use cache::GenericCache;
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use error::{CacheError, Result};
pub use stats::CacheStats;
