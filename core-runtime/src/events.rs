//! # Event Bus System
//!
//! Typed activity events for the client core, broadcast over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Every state transition in the resilience core is published here: cache
//! writes, evictions and expirations, retry attempts, queue enqueue/drain/
//! abandon, persistence failures and connectivity changes. Subscribers form the
//! structured activity log; [`CoreEvent::to_record`] flattens an event into the
//! `{action, details, severity, metadata}` shape host loggers expect.
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ GenericCache ├──────────────>│           │
//! └──────────────┘               │           │     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │ EventBus  ├─────────────────>│ Subscriber │
//! │ RetryExecutor├──────────────>│ (broadcast│                  └────────────┘
//! └──────────────┘               │  channel) │     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │           ├─────────────────>│ Subscriber │
//! │ OfflineQueue ├──────────────>│           │                  └────────────┘
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Queue(QueueEvent::Enqueued {
//!         operation_id: "1700000000000-abc".to_string(),
//!         kind: "insert".to_string(),
//!         resource: "registrations".to_string(),
//!         pending: 1,
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.action(), "queue.enqueued");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Publishers ignore the "no subscribers" error from [`EventBus::emit`]; the
//! activity log is optional.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Cache(CacheEvent),
    Retry(RetryEvent),
    Queue(QueueEvent),
    Connectivity(ConnectivityEvent),
}

impl CoreEvent {
    /// Stable dotted identifier, e.g. `retry.exhausted`.
    pub fn action(&self) -> &'static str {
        match self {
            CoreEvent::Cache(e) => e.action(),
            CoreEvent::Retry(e) => e.action(),
            CoreEvent::Queue(e) => e.action(),
            CoreEvent::Connectivity(e) => e.action(),
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Retry(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Retry(RetryEvent::Exhausted { .. })
            | CoreEvent::Queue(QueueEvent::Abandoned { .. })
            | CoreEvent::Queue(QueueEvent::PersistenceFailed { .. }) => EventSeverity::Error,
            CoreEvent::Retry(RetryEvent::AttemptFailed { .. })
            | CoreEvent::Queue(QueueEvent::ReplayFailed { .. })
            | CoreEvent::Queue(QueueEvent::LoadFailed { .. })
            | CoreEvent::Queue(QueueEvent::QuotaShed { .. })
            | CoreEvent::Connectivity(ConnectivityEvent::WentOffline) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::PatternInvalidated { .. })
            | CoreEvent::Queue(QueueEvent::Enqueued { .. })
            | CoreEvent::Queue(QueueEvent::SyncCompleted { .. })
            | CoreEvent::Queue(QueueEvent::Pruned { .. })
            | CoreEvent::Connectivity(ConnectivityEvent::WentOnline) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Flatten into an activity-log record.
    pub fn to_record(&self) -> ActivityRecord {
        let metadata = serde_json::to_value(self)
            .ok()
            .and_then(|value| value.get("payload").cloned())
            .unwrap_or(serde_json::Value::Null);

        ActivityRecord {
            action: self.action().to_string(),
            details: self.description().to_string(),
            severity: self.severity(),
            metadata,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// One line of the structured activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: String,
    pub details: String,
    pub severity: EventSeverity,
    pub metadata: serde_json::Value,
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A value was stored (or replaced).
    EntrySet { key: String, size_bytes: u64 },
    /// An entry was removed to make room for a new one.
    EntryEvicted { key: String, access_count: u64 },
    /// An entry outlived its TTL and was removed.
    EntryExpired { key: String },
    /// Keys matching a pattern were dropped.
    PatternInvalidated { pattern: String, removed: u64 },
    /// A sweep finished.
    CleanupCompleted { removed: u64 },
    /// Everything was dropped.
    Cleared { removed: u64 },
}

impl CacheEvent {
    fn action(&self) -> &'static str {
        match self {
            CacheEvent::EntrySet { .. } => "cache.set",
            CacheEvent::EntryEvicted { .. } => "cache.evicted",
            CacheEvent::EntryExpired { .. } => "cache.expired",
            CacheEvent::PatternInvalidated { .. } => "cache.invalidated",
            CacheEvent::CleanupCompleted { .. } => "cache.cleanup",
            CacheEvent::Cleared { .. } => "cache.cleared",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            CacheEvent::EntrySet { .. } => "Cache entry stored",
            CacheEvent::EntryEvicted { .. } => "Cache entry evicted",
            CacheEvent::EntryExpired { .. } => "Cache entry expired",
            CacheEvent::PatternInvalidated { .. } => "Cache entries invalidated by pattern",
            CacheEvent::CleanupCompleted { .. } => "Expired cache entries swept",
            CacheEvent::Cleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Retry Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RetryEvent {
    /// An attempt failed and another one is scheduled.
    AttemptFailed {
        operation: String,
        attempt: u32,
        max_attempts: u32,
        delay_ms: u64,
        error: String,
    },
    /// The operation eventually succeeded.
    Succeeded { operation: String, attempts: u32 },
    /// The operation failed for good: attempts ran out or the error was not
    /// retryable.
    Exhausted {
        operation: String,
        attempts: u32,
        error: String,
    },
    /// The caller cancelled the run.
    Cancelled { operation: String, attempts: u32 },
}

impl RetryEvent {
    fn action(&self) -> &'static str {
        match self {
            RetryEvent::AttemptFailed { .. } => "retry.attempt_failed",
            RetryEvent::Succeeded { .. } => "retry.succeeded",
            RetryEvent::Exhausted { .. } => "retry.exhausted",
            RetryEvent::Cancelled { .. } => "retry.cancelled",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            RetryEvent::AttemptFailed { .. } => "Remote attempt failed, retrying",
            RetryEvent::Succeeded { .. } => "Remote operation succeeded",
            RetryEvent::Exhausted { .. } => "Remote operation failed after retries",
            RetryEvent::Cancelled { .. } => "Remote operation cancelled",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// A mutation was queued for later replay.
    Enqueued {
        operation_id: String,
        kind: String,
        resource: String,
        pending: u64,
    },
    /// A queued mutation reached the backend.
    Replayed {
        operation_id: String,
        resource: String,
    },
    /// A replay failed; the mutation stays queued.
    ReplayFailed {
        operation_id: String,
        attempts: u32,
        error: String,
    },
    /// A mutation hit its replay limit and was dropped.
    Abandoned {
        operation_id: String,
        resource: String,
        attempts: u32,
        error: String,
    },
    /// A drain pass finished.
    SyncCompleted {
        successful: u64,
        failed: u64,
        abandoned: u64,
    },
    /// The queue snapshot could not be written.
    PersistenceFailed {
        storage_key: String,
        message: String,
        dropped: u64,
    },
    /// The store was full; the oldest entries were dropped and the smaller
    /// snapshot was written.
    QuotaShed {
        storage_key: String,
        dropped: u64,
        remaining: u64,
    },
    /// The persisted snapshot was unreadable and ignored.
    LoadFailed { storage_key: String, message: String },
    /// Stale entries were removed on load.
    Pruned { removed: u64 },
}

impl QueueEvent {
    fn action(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "queue.enqueued",
            QueueEvent::Replayed { .. } => "queue.replayed",
            QueueEvent::ReplayFailed { .. } => "queue.replay_failed",
            QueueEvent::Abandoned { .. } => "queue.abandoned",
            QueueEvent::SyncCompleted { .. } => "queue.sync_completed",
            QueueEvent::PersistenceFailed { .. } => "queue.persistence_failed",
            QueueEvent::QuotaShed { .. } => "queue.quota_shed",
            QueueEvent::LoadFailed { .. } => "queue.load_failed",
            QueueEvent::Pruned { .. } => "queue.pruned",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "Mutation queued for offline replay",
            QueueEvent::Replayed { .. } => "Queued mutation replayed",
            QueueEvent::ReplayFailed { .. } => "Queued mutation replay failed",
            QueueEvent::Abandoned { .. } => "Queued mutation abandoned",
            QueueEvent::SyncCompleted { .. } => "Offline queue drained",
            QueueEvent::PersistenceFailed { .. } => "Offline queue could not be persisted",
            QueueEvent::QuotaShed { .. } => "Oldest queued mutations dropped to fit storage quota",
            QueueEvent::LoadFailed { .. } => "Persisted offline queue was unreadable",
            QueueEvent::Pruned { .. } => "Stale queued mutations pruned",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    WentOnline,
    WentOffline,
}

impl ConnectivityEvent {
    fn action(&self) -> &'static str {
        match self {
            ConnectivityEvent::WentOnline => "connectivity.online",
            ConnectivityEvent::WentOffline => "connectivity.offline",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ConnectivityEvent::WentOnline => "Connection restored",
            ConnectivityEvent::WentOffline => "Connection lost",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Clone it freely; every clone publishes into the same channel. Slow
/// subscribers get `RecvError::Lagged` instead of blocking publishers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let problems = EventStream::new(event_bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is
    /// buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
