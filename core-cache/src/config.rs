//! Cache configuration

use crate::error::{CacheError, Result};
use std::time::Duration;

/// Configuration for [`GenericCache`](crate::GenericCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Upper bound on the sum of estimated entry sizes (default: 50 MiB)
    pub max_size_bytes: u64,

    /// Upper bound on the number of entries (default: 1000)
    pub max_items: usize,

    /// TTL applied when `set` is called without one (default: 5 min)
    pub default_ttl: Duration,

    /// Period of the background expiry sweep (default: 60 s)
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            max_items: 1000,
            default_ttl: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    pub fn with_max_items(mut self, items: usize) -> Self {
        self.max_items = items;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::Config(
                "max_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.max_items == 0 {
            return Err(CacheError::Config(
                "max_items must be at least 1".to_string(),
            ));
        }

        if self.default_ttl.is_zero() {
            return Err(CacheError::Config(
                "default_ttl must be greater than 0".to_string(),
            ));
        }

        if self.cleanup_interval.is_zero() {
            return Err(CacheError::Config(
                "cleanup_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_size_bytes, 52_428_800);
        assert_eq!(config.max_items, 1000);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::new()
            .with_max_size_bytes(1024)
            .with_max_items(2)
            .with_default_ttl(Duration::from_millis(50))
            .with_cleanup_interval(Duration::from_millis(10));

        assert_eq!(config.max_size_bytes, 1024);
        assert_eq!(config.max_items, 2);
        assert_eq!(config.default_ttl, Duration::from_millis(50));
        assert_eq!(config.cleanup_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::new().with_max_size_bytes(0).validate().is_err());
        assert!(CacheConfig::new().with_max_items(0).validate().is_err());
        assert!(CacheConfig::new()
            .with_default_ttl(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CacheConfig::new()
            .with_cleanup_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
