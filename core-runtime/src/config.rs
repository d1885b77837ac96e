//! # Core Configuration Module
//!
//! Builder-based configuration holding the host bridges and feature flags the
//! client core is initialised with.
//!
//! ## Required Dependencies
//!
//! - `DurableStore` - persistence for the offline mutation queue
//!
//! ## Optional Dependencies
//!
//! - `ConnectivitySource` - online/offline detection (absent: assume online)
//! - `Clock` - time source (default: [`SystemClock`])
//! - `LoggerSink` - host log forwarding
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .durable_store(Arc::new(MyStore))
//!     .connectivity(Arc::new(MyConnectivity))
//!     .enable_network_awareness(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Missing required bridges fail fast with an actionable message:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing DurableStore");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, ConnectivitySource, DurableStore, LoggerSink, SystemClock};
use std::sync::Arc;

/// Core configuration for the client core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Durable key/value storage (required)
    pub durable_store: Arc<dyn DurableStore>,

    /// Connectivity status source (optional)
    pub connectivity: Option<Arc<dyn ConnectivitySource>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Host logger (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Buffer size of the activity event bus
    pub event_buffer_size: usize,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("durable_store", &"DurableStore { ... }")
            .field(
                "connectivity",
                &self
                    .connectivity
                    .as_ref()
                    .map(|_| "ConnectivitySource { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Run the periodic cache expiry sweep
    pub enable_background_cleanup: bool,

    /// Run the periodic offline-queue drain
    pub enable_background_sync: bool,

    /// Follow connectivity transitions (requires ConnectivitySource)
    pub enable_network_awareness: bool,

    /// Publish activity events on the event bus
    pub enable_activity_log: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_background_cleanup: true,
            enable_background_sync: true,
            enable_network_awareness: false,
            enable_activity_log: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The event buffer can hold at least one event
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_network_awareness && self.connectivity.is_none() {
            return Err(Error::Config(
                "Network awareness enabled but no ConnectivitySource provided. \
                 Disable the feature or inject a ConnectivitySource implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn durable_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "DurableStore".to_string(),
        message: "DurableStore implementation is required for the offline mutation queue. \
                 Desktop: enable the 'desktop-shims' feature of core-service to use SqliteDurableStore. \
                 Web: inject a localStorage-backed store. \
                 Tests: use bridge_traits::mock::MemoryDurableStore."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    durable_store: Option<Arc<dyn DurableStore>>,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    event_buffer_size: Option<usize>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    /// Sets the durable store implementation (required).
    pub fn durable_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.durable_store = Some(store);
        self
    }

    /// Sets the connectivity source (optional).
    ///
    /// Without one the core assumes it is always online.
    pub fn connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    /// Sets the clock. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the host logger sink (optional).
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Sets the activity event bus buffer size.
    ///
    /// Default: 256
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Replaces all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    pub fn enable_background_cleanup(mut self, enable: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_background_cleanup = enable;
        self
    }

    pub fn enable_background_sync(mut self, enable: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_background_sync = enable;
        self
    }

    pub fn enable_network_awareness(mut self, enable: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_network_awareness = enable;
        self
    }

    pub fn enable_activity_log(mut self, enable: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_activity_log = enable;
        self
    }

    /// Builds the [`CoreConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if no `DurableStore` was injected
    /// - [`Error::Config`] if validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let durable_store = self.durable_store.ok_or_else(durable_store_missing_error)?;

        let config = CoreConfig {
            durable_store,
            connectivity: self.connectivity,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
