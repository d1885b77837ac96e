//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (durable storage,
//! connectivity, clock) into the client core and owns the three resilience
//! components: the data cache, the retry executor and the offline fallback
//! queue. Desktop apps typically enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`); other hosts build a [`CoreConfig`] with their
//! own bridges and call [`CoreService::new`].
//!
//! ```ignore
//! use core_service::{CoreDependencies, CoreService};
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .durable_store(store)
//!     .connectivity(connectivity)
//!     .enable_network_awareness(true)
//!     .build()?;
//!
//! let core = CoreService::new(CoreDependencies::new(config, replayer))?;
//! core.start().await?;
//!
//! let events = core
//!     .cache()
//!     .get_or_set("events:upcoming", || fetch_upcoming(&api), None)
//!     .await?;
//!
//! core.shutdown().await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_cache::{CacheConfig, GenericCache};
use core_offline::{FallbackConfig, MutationReplayer, OfflineFallbackQueue};
use core_retry::RetryExecutor;
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
use bridge_desktop::{DesktopConnectivityMonitor, SqliteDurableStore};

/// Cache of backend documents (event listings, media metadata, settings).
pub type DataCache = GenericCache<serde_json::Value>;

/// Everything the service needs to construct its components.
pub struct CoreDependencies {
    pub config: CoreConfig,
    /// Maps queued mutations onto the backend client
    pub replayer: Arc<dyn MutationReplayer>,
    pub cache: CacheConfig,
    pub fallback: FallbackConfig,
}

impl CoreDependencies {
    /// Bundle bridges and the replayer with default component settings.
    pub fn new(config: CoreConfig, replayer: Arc<dyn MutationReplayer>) -> Self {
        Self {
            config,
            replayer,
            cache: CacheConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }

    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_fallback_config(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Primary façade exposed to host applications.
///
/// Constructs each component once; [`start`](Self::start) launches the
/// background work selected by the feature flags and
/// [`shutdown`](Self::shutdown) stops it.
pub struct CoreService {
    event_bus: Arc<EventBus>,
    cache: Arc<DataCache>,
    retry: RetryExecutor,
    offline: Arc<OfflineFallbackQueue>,
    features: FeatureFlags,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl CoreService {
    /// Create a new service from the provided dependencies.
    pub fn new(deps: CoreDependencies) -> Result<Self> {
        let CoreDependencies {
            config,
            replayer,
            cache,
            fallback,
        } = deps;
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let features = config.features;
        let activity = features.enable_activity_log.then(|| event_bus.clone());

        let mut data_cache = GenericCache::new(cache)?.with_clock(config.clock.clone());
        let mut retry = RetryExecutor::new();
        let mut offline = OfflineFallbackQueue::new(fallback, config.durable_store.clone(), replayer)?
            .with_clock(config.clock.clone());

        if let Some(source) = &config.connectivity {
            offline = offline.with_connectivity(source.clone());
        }

        if let Some(bus) = activity {
            data_cache = data_cache.with_event_bus(bus.clone());
            retry = retry.with_event_bus(bus.clone());
            offline = offline.with_event_bus(bus);
        }

        debug!(?features, "Core service constructed");

        Ok(Self {
            event_bus,
            cache: Arc::new(data_cache),
            retry,
            offline: Arc::new(offline),
            features,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Load the persisted offline queue and start background tasks.
    ///
    /// Calling it again after a successful start is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(CoreError::InitializationFailed(
                "service has been shut down".to_string(),
            ));
        }

        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Core service already started");
            return Ok(());
        }

        let pending = match self.offline.initialize().await {
            Ok(pending) => pending,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let mut tasks = Vec::new();

        if self.features.enable_background_cleanup {
            tasks.push(self.cache.spawn_cleanup_task(self.shutdown.child_token()));
        }

        if self.features.enable_background_sync {
            tasks.push(
                self.offline
                    .clone()
                    .spawn_sync_ticker(self.shutdown.child_token()),
            );
        }

        if self.features.enable_network_awareness {
            match self
                .offline
                .clone()
                .spawn_connectivity_watcher(self.shutdown.child_token())
            {
                Some(handle) => tasks.push(handle),
                None => warn!("Network awareness enabled without a connectivity source"),
            }
        }

        info!(pending, background_tasks = tasks.len(), "Core service started");
        self.tasks.lock().extend(tasks);
        Ok(())
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        info!(stopped = count, "Core service shut down");
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Token cancelled on shutdown; pass child tokens to long-running calls.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn cache(&self) -> Arc<DataCache> {
        Arc::clone(&self.cache)
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn offline(&self) -> Arc<OfflineFallbackQueue> {
        Arc::clone(&self.offline)
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Subscribe to the structured activity log.
    pub fn activity(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("features", &self.features)
            .field("running", &self.is_running())
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses a SQLite file at `db_path` for the offline queue and a TCP probe for
/// connectivity, with network awareness on.
///
/// ```ignore
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop("data/eventsite.db".into(), replayer).await?;
/// core.start().await?;
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    db_path: std::path::PathBuf,
    replayer: Arc<dyn MutationReplayer>,
) -> Result<CoreService> {
    let store = SqliteDurableStore::new(db_path).await?;
    let config = CoreConfig::builder()
        .durable_store(Arc::new(store))
        .connectivity(Arc::new(DesktopConnectivityMonitor::new()))
        .enable_network_awareness(true)
        .build()?;

    CoreService::new(CoreDependencies::new(config, replayer))
}
