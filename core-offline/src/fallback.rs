//! # Offline Fallback Queue
//!
//! Keeps remote mutations from being lost while the backend is unreachable.
//!
//! ## Workflow
//!
//! ### Executing a call
//! 1. Online: run the remote operation under the remote-data retry profile
//! 2. Offline, or retries exhausted: queue the mutation (if the call is one)
//!    and persist the queue
//! 3. Answer from the local fallback
//!
//! ### Draining
//! 1. Snapshot the queue
//! 2. Replay each entry through [`RetryExecutor`]
//! 3. Remove successes; count failures and abandon entries at the limit
//! 4. Persist once
//!
//! Drains are serialised. The in-memory queue is authoritative: a failed
//! write to the durable store is logged and never surfaces to callers.

use crate::config::FallbackConfig;
use crate::error::{OfflineError, Result};
use crate::operation::{MutationInfo, PendingOperation};
use crate::replayer::MutationReplayer;
use bridge_traits::{Clock, ConnectivitySource, DurableStore, NetworkStatus, SystemClock};
use chrono::Duration as ChronoDuration;
use core_retry::{RemoteError, RetryExecutor, RetryProfile};
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus, QueueEvent};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Replayed and removed
    pub successful: usize,
    /// Failed but still queued
    pub failed: usize,
    /// Failed for the last time and removed
    pub abandoned: usize,
    /// `<operation id>: <error>` for every failure in the pass
    pub errors: Vec<String>,
}

impl SyncSummary {
    pub fn is_empty(&self) -> bool {
        self.successful == 0 && self.failed == 0 && self.abandoned == 0
    }
}

/// Durable queue of mutations waiting for connectivity.
pub struct OfflineFallbackQueue {
    config: FallbackConfig,
    store: Arc<dyn DurableStore>,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    clock: Arc<dyn Clock>,
    replayer: Arc<dyn MutationReplayer>,
    executor: RetryExecutor,
    queue: Mutex<Vec<PendingOperation>>,
    sync_lock: Mutex<()>,
    online: AtomicBool,
    event_bus: Option<Arc<EventBus>>,
}

impl OfflineFallbackQueue {
    /// Create a queue. Call [`initialize`](Self::initialize) before use to
    /// load the persisted snapshot.
    pub fn new(
        config: FallbackConfig,
        store: Arc<dyn DurableStore>,
        replayer: Arc<dyn MutationReplayer>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            store,
            connectivity: None,
            clock: Arc::new(SystemClock),
            replayer,
            executor: RetryExecutor::new(),
            queue: Mutex::new(Vec::new()),
            sync_lock: Mutex::new(()),
            online: AtomicBool::new(true),
            event_bus: None,
        })
    }

    /// Without a source the queue assumes it is online.
    pub fn with_connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set event bus for queue, retry and connectivity events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.executor = self.executor.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    /// Load the persisted queue, prune stale entries and seed connectivity.
    ///
    /// A snapshot that cannot be read or parsed is discarded with a warning
    /// and the queue starts empty. Returns the number of pending operations
    /// afterwards.
    #[instrument(skip(self), fields(storage_key = %self.config.storage_key))]
    pub async fn initialize(&self) -> Result<usize> {
        let stored = match self.store.get(&self.config.storage_key).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Persisted offline queue is unreadable, starting empty");
                self.load_failed(e.to_string());
                None
            }
        };

        let mut loaded = match stored {
            Some(blob) => match serde_json::from_str::<Vec<PendingOperation>>(&blob) {
                Ok(operations) => operations,
                Err(e) => {
                    warn!(error = %e, "Persisted offline queue is corrupt, starting empty");
                    self.load_failed(e.to_string());
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let retention = ChronoDuration::from_std(self.config.retention)
            .map_err(|e| OfflineError::Config(format!("retention out of range: {}", e)))?;
        let cutoff = self.clock.now() - retention;
        let before = loaded.len();
        loaded.retain(|op| !op.is_older_than(cutoff));
        let pruned = before - loaded.len();

        let pending = {
            let mut queue = self.queue.lock().await;
            loaded.append(&mut queue);
            *queue = loaded;

            if pruned > 0 {
                info!(pruned, "Pruned stale queued mutations");
                self.emit(CoreEvent::Queue(QueueEvent::Pruned {
                    removed: pruned as u64,
                }));
                self.persist(&mut queue).await;
            }
            queue.len()
        };

        if let Some(source) = &self.connectivity {
            let online = source
                .current_status()
                .await
                .map(|status| status.is_online())
                .unwrap_or(true);
            self.online.store(online, Ordering::SeqCst);
        }

        info!(pending, online = self.is_online(), "Offline queue initialized");
        Ok(pending)
    }

    fn load_failed(&self, message: String) {
        self.emit(CoreEvent::Queue(QueueEvent::LoadFailed {
            storage_key: self.config.storage_key.clone(),
            message,
        }));
    }

    /// Run a remote call, falling back to local data when it cannot complete.
    ///
    /// When `mutation` is given and the remote call is skipped (offline) or
    /// fails for good, the mutation is queued for replay. The local
    /// fallback's result is returned in that case, and its error is the only
    /// error this method produces.
    #[instrument(skip_all, fields(mutation = mutation.as_ref().map(|m| m.label())))]
    pub async fn execute_with_fallback<T, E, R, RFut, L, LFut>(
        &self,
        remote_op: R,
        local_fallback: L,
        mutation: Option<MutationInfo>,
        token: &CancellationToken,
    ) -> std::result::Result<T, E>
    where
        R: FnMut() -> RFut,
        RFut: Future<Output = std::result::Result<T, RemoteError>>,
        L: FnOnce() -> LFut,
        LFut: Future<Output = std::result::Result<T, E>>,
    {
        let name = mutation
            .as_ref()
            .map(MutationInfo::label)
            .unwrap_or_else(|| "remote_read".to_string());

        let mut cancelled = false;
        if self.is_online() {
            let outcome = self
                .executor
                .execute_with_retry(
                    remote_op,
                    &name,
                    &RetryProfile::RemoteData.options(),
                    token,
                )
                .await;

            match outcome.result {
                Ok(value) => return Ok(value),
                Err(RemoteError::Cancelled) => cancelled = true,
                Err(e) => {
                    warn!(operation = %name, attempts = outcome.attempts, error = %e, "Remote call failed, using local fallback");
                }
            }
        } else {
            debug!(operation = %name, "Offline, skipping remote call");
        }

        if let Some(info) = mutation {
            if cancelled {
                debug!(operation = %name, "Remote call cancelled, mutation not queued");
            } else {
                self.enqueue(info).await;
            }
        }

        local_fallback().await
    }

    /// Queue a mutation and persist the queue.
    pub async fn enqueue(&self, info: MutationInfo) -> PendingOperation {
        let operation = PendingOperation::new(info, self.clock.now());

        let mut queue = self.queue.lock().await;
        queue.push(operation.clone());

        info!(
            operation_id = %operation.id,
            kind = %operation.kind,
            resource = %operation.resource,
            pending = queue.len(),
            "Mutation queued for replay"
        );
        self.emit(CoreEvent::Queue(QueueEvent::Enqueued {
            operation_id: operation.id.clone(),
            kind: operation.kind.as_str().to_string(),
            resource: operation.resource.clone(),
            pending: queue.len() as u64,
        }));

        self.persist(&mut queue).await;
        operation
    }

    /// Record a connectivity change reported by the host.
    ///
    /// Going online drains the queue when `sync_on_reconnect` is set; the
    /// summary of that drain is returned.
    pub async fn set_connectivity(&self, status: NetworkStatus) -> Option<SyncSummary> {
        if self.update_connectivity(status) && self.config.sync_on_reconnect {
            return Some(
                self.sync_pending_operations(&CancellationToken::new())
                    .await,
            );
        }
        None
    }

    /// Flip the online flag. Returns `true` only when this call brought the
    /// queue back online.
    fn update_connectivity(&self, status: NetworkStatus) -> bool {
        let online = status.is_online();
        if self.online.swap(online, Ordering::SeqCst) == online {
            return false;
        }

        if online {
            info!("Connection restored");
            self.emit(CoreEvent::Connectivity(ConnectivityEvent::WentOnline));
        } else {
            warn!("Connection lost, remote calls will be queued");
            self.emit(CoreEvent::Connectivity(ConnectivityEvent::WentOffline));
        }
        online
    }

    /// Ask the source again after a failed replay. Only a report of lost
    /// connectivity is applied here; reconnects arrive through the watcher.
    async fn confirm_online(&self) -> bool {
        if let Some(source) = &self.connectivity {
            if let Ok(status) = source.current_status().await {
                if !status.is_online() {
                    self.update_connectivity(status);
                }
            }
        }
        self.is_online()
    }

    /// Replay every queued mutation once.
    ///
    /// Skipped while offline, and stops as soon as connectivity is lost; a
    /// replay that failed because the connection dropped is not counted
    /// against the entry. Only one drain runs at a time; a second caller
    /// waits and then drains whatever is left.
    #[instrument(skip(self, token))]
    pub async fn sync_pending_operations(&self, token: &CancellationToken) -> SyncSummary {
        let _drain = self.sync_lock.lock().await;
        let mut summary = SyncSummary::default();

        if !self.is_online() {
            debug!("Offline, skipping queue drain");
            return summary;
        }

        let snapshot = self.queue.lock().await.clone();
        if snapshot.is_empty() {
            return summary;
        }

        info!(pending = snapshot.len(), "Draining offline queue");

        for operation in &snapshot {
            if token.is_cancelled() {
                info!("Queue drain cancelled");
                break;
            }

            if !self.is_online() {
                info!("Connection lost, pausing queue drain");
                break;
            }

            let outcome = self
                .executor
                .execute_with_retry(
                    || self.replayer.replay(operation),
                    &operation.label(),
                    &self.config.replay_retry,
                    token,
                )
                .await;

            match outcome.result {
                Ok(()) => {
                    self.queue.lock().await.retain(|op| op.id != operation.id);
                    summary.successful += 1;
                    debug!(operation_id = %operation.id, "Queued mutation replayed");
                    self.emit(CoreEvent::Queue(QueueEvent::Replayed {
                        operation_id: operation.id.clone(),
                        resource: operation.resource.clone(),
                    }));
                }
                Err(RemoteError::Cancelled) => {
                    info!("Queue drain cancelled");
                    break;
                }
                Err(e) => {
                    if !self.confirm_online().await {
                        info!(operation_id = %operation.id, error = %e, "Connection lost during replay, pausing queue drain");
                        break;
                    }
                    self.record_failure(operation, &e, &mut summary).await;
                }
            }
        }

        if !summary.is_empty() {
            let mut queue = self.queue.lock().await;
            self.persist(&mut queue).await;
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Offline queue drained"
        );
        self.emit(CoreEvent::Queue(QueueEvent::SyncCompleted {
            successful: summary.successful as u64,
            failed: summary.failed as u64,
            abandoned: summary.abandoned as u64,
        }));

        summary
    }

    async fn record_failure(
        &self,
        operation: &PendingOperation,
        err: &RemoteError,
        summary: &mut SyncSummary,
    ) {
        summary.errors.push(format!("{}: {}", operation.id, err));

        let mut queue = self.queue.lock().await;
        let Some(index) = queue.iter().position(|op| op.id == operation.id) else {
            // Cleared while the replay was in flight.
            return;
        };

        queue[index].attempts += 1;
        let attempts = queue[index].attempts;

        if attempts >= self.config.max_replay_attempts {
            queue.remove(index);
            summary.abandoned += 1;
            error!(
                operation_id = %operation.id,
                resource = %operation.resource,
                attempts,
                error = %err,
                "Queued mutation abandoned"
            );
            self.emit(CoreEvent::Queue(QueueEvent::Abandoned {
                operation_id: operation.id.clone(),
                resource: operation.resource.clone(),
                attempts,
                error: err.to_string(),
            }));
        } else {
            summary.failed += 1;
            warn!(
                operation_id = %operation.id,
                attempts,
                error = %err,
                "Queued mutation replay failed"
            );
            self.emit(CoreEvent::Queue(QueueEvent::ReplayFailed {
                operation_id: operation.id.clone(),
                attempts,
                error: err.to_string(),
            }));
        }
    }

    /// Write the queue snapshot. On a quota failure the oldest share of the
    /// queue is dropped and the write is tried once more.
    async fn persist(&self, queue: &mut Vec<PendingOperation>) {
        let err = match self.write_snapshot(queue).await {
            Ok(()) => return,
            Err(e) => e,
        };

        if !err.is_quota_exceeded() {
            error!(storage_key = %self.config.storage_key, error = %err, "Failed to persist offline queue");
            self.persistence_failed(&err, 0);
            return;
        }

        let dropped = self.shed_oldest(queue);
        warn!(
            storage_key = %self.config.storage_key,
            dropped,
            remaining = queue.len(),
            "Storage quota exceeded, dropped oldest queued mutations"
        );

        match self.write_snapshot(queue).await {
            Ok(()) => self.emit(CoreEvent::Queue(QueueEvent::QuotaShed {
                storage_key: self.config.storage_key.clone(),
                dropped: dropped as u64,
                remaining: queue.len() as u64,
            })),
            Err(retry_err) => {
                error!(storage_key = %self.config.storage_key, error = %retry_err, "Failed to persist offline queue after shedding");
                self.persistence_failed(&retry_err, dropped);
            }
        }
    }

    async fn write_snapshot(&self, queue: &[PendingOperation]) -> Result<()> {
        let blob = serde_json::to_string(queue)?;
        self.store.set(&self.config.storage_key, &blob).await?;
        Ok(())
    }

    fn shed_oldest(&self, queue: &mut Vec<PendingOperation>) -> usize {
        if queue.is_empty() {
            return 0;
        }

        queue.sort_by_key(|op| op.enqueued_at);
        let count = ((queue.len() as f64 * self.config.quota_drop_fraction).floor() as usize)
            .clamp(1, queue.len());
        queue.drain(..count);
        count
    }

    fn persistence_failed(&self, err: &OfflineError, dropped: usize) {
        self.emit(CoreEvent::Queue(QueueEvent::PersistenceFailed {
            storage_key: self.config.storage_key.clone(),
            message: err.to_string(),
            dropped: dropped as u64,
        }));
    }

    /// Start the connectivity watcher and the periodic drain.
    pub fn spawn_background_tasks(self: Arc<Self>, token: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);
        if let Some(handle) = self.clone().spawn_connectivity_watcher(token.clone()) {
            handles.push(handle);
        }
        handles.push(self.spawn_sync_ticker(token));
        handles
    }

    /// Follow the connectivity source's transitions until `token` is
    /// cancelled or the stream closes. `None` without a source.
    pub fn spawn_connectivity_watcher(
        self: Arc<Self>,
        token: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let source = self.connectivity.clone()?;

        Some(tokio::spawn(async move {
            let mut changes = match source.subscribe_changes().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "Connectivity changes unavailable");
                    return;
                }
            };

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.next() => match change {
                        Some(status) => {
                            if self.update_connectivity(status) && self.config.sync_on_reconnect {
                                // Drain off the loop so later transitions are still seen.
                                let queue = Arc::clone(&self);
                                let token = token.clone();
                                tokio::spawn(async move {
                                    queue.sync_pending_operations(&token).await;
                                });
                            }
                        }
                        None => {
                            debug!("Connectivity stream closed");
                            break;
                        }
                    },
                }
            }
        }))
    }

    /// Drain every `sync_interval` while online and non-empty.
    pub fn spawn_sync_ticker(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let period = self.config.sync_interval;

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if self.is_online() && self.pending_count().await > 0 {
                            self.sync_pending_operations(&token).await;
                        }
                    }
                }
            }

            debug!("Offline queue sync ticker stopped");
        })
    }

    pub async fn pending_operations(&self) -> Vec<PendingOperation> {
        self.queue.lock().await.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Drop every queued mutation. Returns how many were dropped.
    pub async fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let removed = queue.len();
        queue.clear();
        self.persist(&mut queue).await;

        info!(removed, "Offline queue cleared");
        removed
    }
}

impl std::fmt::Debug for OfflineFallbackQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineFallbackQueue")
            .field("config", &self.config)
            .field("online", &self.is_online())
            .field("has_connectivity", &self.connectivity.is_some())
            .finish_non_exhaustive()
    }
}
