//! Offline queue configuration

use crate::error::{OfflineError, Result};
use core_retry::{RetryOptions, RetryProfile};
use std::time::Duration;

/// Configuration for [`OfflineFallbackQueue`](crate::OfflineFallbackQueue).
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Durable store key holding the queue snapshot (default: `offline_fallback_queue`)
    pub storage_key: String,

    /// Failed replay passes after which a mutation is abandoned (default: 5)
    pub max_replay_attempts: u32,

    /// Entries older than this are pruned on load (default: 7 days)
    pub retention: Duration,

    /// Period of the background drain while online (default: 5 min)
    pub sync_interval: Duration,

    /// Drain as soon as connectivity returns (default: true)
    pub sync_on_reconnect: bool,

    /// Share of the oldest entries shed when the store is full (default: 0.3)
    pub quota_drop_fraction: f64,

    /// Retry schedule for each replay (default: the remote-data profile)
    pub replay_retry: RetryOptions,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            storage_key: "offline_fallback_queue".to_string(),
            max_replay_attempts: 5,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            sync_interval: Duration::from_secs(5 * 60),
            sync_on_reconnect: true,
            quota_drop_fraction: 0.3,
            replay_retry: RetryProfile::RemoteData.options(),
        }
    }
}

impl FallbackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_max_replay_attempts(mut self, attempts: u32) -> Self {
        self.max_replay_attempts = attempts;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.sync_on_reconnect = enabled;
        self
    }

    pub fn with_quota_drop_fraction(mut self, fraction: f64) -> Self {
        self.quota_drop_fraction = fraction;
        self
    }

    pub fn with_replay_retry(mut self, options: impl Into<RetryOptions>) -> Self {
        self.replay_retry = options.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(OfflineError::Config(
                "storage_key must not be empty".to_string(),
            ));
        }

        if self.max_replay_attempts == 0 {
            return Err(OfflineError::Config(
                "max_replay_attempts must be at least 1".to_string(),
            ));
        }

        if self.retention.is_zero() {
            return Err(OfflineError::Config(
                "retention must be greater than 0".to_string(),
            ));
        }

        if self.sync_interval.is_zero() {
            return Err(OfflineError::Config(
                "sync_interval must be greater than 0".to_string(),
            ));
        }

        if !(self.quota_drop_fraction > 0.0 && self.quota_drop_fraction <= 1.0) {
            return Err(OfflineError::Config(
                "quota_drop_fraction must be in (0, 1]".to_string(),
            ));
        }

        self.replay_retry.validate()?;
        Ok(())
    }
}
