//! # Generic Cache
//!
//! In-memory key/value store bounded by total estimated size and entry count,
//! with per-entry TTL and a recency-decayed LFU eviction heuristic.
//!
//! Expired entries are removed lazily on lookup and by a periodic sweep
//! ([`GenericCache::spawn_cleanup_task`]). Eviction only runs inside `set`,
//! before the new entry is inserted, so the bounds hold after every call.
//!
//! Concurrent `get_or_set` calls for the same missing key share one factory
//! future; the factory runs once per miss and every waiter receives its value
//! or its error.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::stats::{CacheStats, Counters};
use bridge_traits::{Clock, SystemClock};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V>>>;

enum Lookup<V> {
    Hit(V),
    Expired,
    Missing,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    total_size_bytes: u64,
    next_sequence: u64,
    counters: Counters,
}

impl<V: Clone> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            total_size_bytes: 0,
            next_sequence: 0,
            counters: Counters::default(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.total_size_bytes = self.total_size_bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn insert(&mut self, key: String, entry: CacheEntry<V>) {
        self.total_size_bytes += entry.size_bytes;
        self.entries.insert(key, entry);
    }

    fn lookup(&mut self, key: &str, now: i64, touch: bool) -> Lookup<V> {
        let lookup = match self.entries.get_mut(key) {
            None => Lookup::Missing,
            Some(entry) if entry.is_expired(now) => Lookup::Expired,
            Some(entry) => {
                if touch {
                    entry.touch(now);
                }
                Lookup::Hit(entry.value.clone())
            }
        };

        if matches!(lookup, Lookup::Expired) {
            self.remove(key);
            self.counters.expirations += 1;
        }

        lookup
    }

    /// Evict lowest-scored entries until an item of `incoming` bytes fits.
    fn evict_for(&mut self, incoming: u64, config: &CacheConfig, now: i64) -> Vec<(String, u64)> {
        let mut evicted = Vec::new();

        while !self.entries.is_empty()
            && (self.entries.len() >= config.max_items
                || self.total_size_bytes + incoming > config.max_size_bytes)
        {
            let Some(victim) = self
                .entries
                .iter()
                .min_by(|(_, a), (_, b)| a.eviction_order(b, now))
                .map(|(key, _)| key.clone())
            else {
                break;
            };

            if let Some(entry) = self.remove(&victim) {
                self.counters.evictions += 1;
                evicted.push((victim, entry.access_count));
            }
        }

        evicted
    }

    fn remove_expired(&mut self, now: i64) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        self.counters.expirations += expired.len() as u64;
        expired.len()
    }
}

/// Size- and count-bounded cache for serializable values.
///
/// # Example
///
/// ```rust,ignore
/// use core_cache::{CacheConfig, GenericCache};
/// use std::sync::Arc;
///
/// let cache = Arc::new(GenericCache::<Vec<Event>>::new(CacheConfig::default())?);
/// let _sweeper = cache.spawn_cleanup_task(shutdown.child_token());
///
/// let events = cache
///     .get_or_set("events:upcoming", || api.list_upcoming(), None)
///     .await?;
/// ```
pub struct GenericCache<V> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
    in_flight: Mutex<HashMap<String, SharedLoad<V>>>,
    event_bus: Option<Arc<EventBus>>,
}

impl<V> GenericCache<V>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    /// Create a cache, rejecting invalid configuration.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            state: Mutex::new(CacheState::new()),
            in_flight: Mutex::new(HashMap::new()),
            event_bus: None,
        })
    }

    /// Use a different time source for TTL and eviction scoring.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set event bus for activity events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn now(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Cache(event)).ok();
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` defaults to `config.default_ttl`. Lowest-scored entries are
    /// evicted until the new entry fits both bounds.
    ///
    /// # Errors
    ///
    /// - [`CacheError::CapacityExceeded`] if the item alone is larger than
    ///   `max_size_bytes`; nothing is stored or evicted
    /// - [`CacheError::Serialization`] if the value cannot be serialized
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<()> {
        let size_bytes = estimate_size(key, &value)?;

        if size_bytes > self.config.max_size_bytes {
            warn!(
                key,
                size_bytes,
                max_size_bytes = self.config.max_size_bytes,
                "Cache item larger than the whole cache"
            );
            return Err(CacheError::CapacityExceeded {
                key: key.to_string(),
                size_bytes,
                max_size_bytes: self.config.max_size_bytes,
            });
        }

        let ttl_millis = duration_millis(ttl.unwrap_or(self.config.default_ttl));
        let now = self.now();

        let evicted = {
            let mut state = self.state.lock();
            state.remove(key);
            let evicted = state.evict_for(size_bytes, &self.config, now);

            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.insert(
                key.to_string(),
                CacheEntry::new(value, now, ttl_millis, size_bytes, sequence),
            );
            evicted
        };

        for (evicted_key, access_count) in evicted {
            debug!(key = %evicted_key, access_count, "Evicted cache entry");
            self.emit(CacheEvent::EntryEvicted {
                key: evicted_key,
                access_count,
            });
        }

        debug!(key, size_bytes, ttl_ms = ttl_millis, "Stored cache entry");
        self.emit(CacheEvent::EntrySet {
            key: key.to_string(),
            size_bytes,
        });

        Ok(())
    }

    /// Look up `key`, counting a hit or a miss.
    ///
    /// Hits bump the entry's access count and recency. An expired entry is
    /// removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.now();

        let lookup = {
            let mut state = self.state.lock();
            let lookup = state.lookup(key, now, true);
            match lookup {
                Lookup::Hit(_) => state.counters.hits += 1,
                Lookup::Expired | Lookup::Missing => state.counters.misses += 1,
            }
            lookup
        };

        match lookup {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired => {
                debug!(key, "Cache entry expired on read");
                self.emit(CacheEvent::EntryExpired {
                    key: key.to_string(),
                });
                None
            }
            Lookup::Missing => None,
        }
    }

    /// Presence check without touching hit/miss counters or recency.
    pub fn has(&self, key: &str) -> bool {
        let now = self.now();
        let lookup = self.state.lock().lookup(key, now, false);

        match lookup {
            Lookup::Hit(_) => true,
            Lookup::Expired => {
                self.emit(CacheEvent::EntryExpired {
                    key: key.to_string(),
                });
                false
            }
            Lookup::Missing => false,
        }
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.state.lock().remove(key).is_some();
        if removed {
            debug!(key, "Deleted cache entry");
        }
        removed
    }

    /// Remove every entry whose key matches `pattern`; returns the count.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let matching: Vec<String> = state
                .entries
                .keys()
                .filter(|key| pattern.is_match(key))
                .cloned()
                .collect();

            for key in &matching {
                state.remove(key);
            }
            matching.len()
        };

        info!(pattern = %pattern, removed, "Invalidated cache entries");
        self.emit(CacheEvent::PatternInvalidated {
            pattern: pattern.as_str().to_string(),
            removed: removed as u64,
        });
        removed
    }

    /// Compile `pattern` and invalidate matching keys.
    pub fn invalidate_pattern_str(&self, pattern: &str) -> Result<usize> {
        let regex = Regex::new(pattern).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(self.invalidate_pattern(&regex))
    }

    /// Return the cached value or run `factory`, store and return its value.
    ///
    /// Concurrent callers for the same missing key await the same factory
    /// future. A factory error reaches every waiter as
    /// [`CacheError::Factory`] and nothing is stored. A value too large to
    /// cache is still returned.
    #[instrument(skip(self, factory, ttl))]
    pub async fn get_or_set<F, Fut, E>(&self, key: &str, factory: F, ttl: Option<Duration>) -> Result<V>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let load = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(load) => {
                    debug!("Joining in-flight load");
                    load.clone()
                }
                None => {
                    let pending = factory();
                    let load = async move {
                        pending
                            .await
                            .map_err(|e| CacheError::Factory(Arc::new(e.into())))
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.to_string(), load.clone());
                    load
                }
            }
        };

        let result = load.clone().await;

        // The first waiter to resume retires the load and stores its value.
        let mut in_flight = self.in_flight.lock();
        let owns_slot = in_flight
            .get(key)
            .is_some_and(|current| current.ptr_eq(&load));

        if owns_slot {
            in_flight.remove(key);
            match &result {
                Ok(value) => {
                    if let Err(err) = self.set(key, value.clone(), ttl) {
                        warn!(error = %err, "Loaded value was not cached");
                    }
                }
                Err(err) => warn!(error = %err, "Cache factory failed"),
            }
        }

        result
    }

    /// Remove all expired entries now; returns the count.
    pub fn cleanup(&self) -> usize {
        let now = self.now();
        let removed = self.state.lock().remove_expired(now);

        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
            self.emit(CacheEvent::CleanupCompleted {
                removed: removed as u64,
            });
        }
        removed
    }

    /// Run [`cleanup`](Self::cleanup) every `config.cleanup_interval` until
    /// `token` is cancelled or the cache is dropped.
    pub fn spawn_cleanup_task(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Cache cleanup task cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else {
                            break;
                        };
                        cache.cleanup();
                    }
                }
            }
        })
    }

    /// Drop every entry; returns how many there were.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.len();
            state.entries.clear();
            state.total_size_bytes = 0;
            removed
        };

        info!(removed, "Cleared cache");
        self.emit(CacheEvent::Cleared {
            removed: removed as u64,
        });
        removed
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.state.lock().total_size_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            evictions: state.counters.evictions,
            expirations: state.counters.expirations,
            entries: state.entries.len(),
            total_size_bytes: state.total_size_bytes,
            hit_rate: state.counters.hit_rate(),
        }
    }

    /// Zero the counters; entries are kept.
    pub fn reset_stats(&self) {
        self.state.lock().counters = Counters::default();
    }
}

impl<V> fmt::Debug for GenericCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GenericCache")
            .field("config", &self.config)
            .field("entries", &state.entries.len())
            .field("total_size_bytes", &state.total_size_bytes)
            .finish()
    }
}

/// `len(key) + len(json(value))`.
fn estimate_size<V: Serialize>(key: &str, value: &V) -> Result<u64> {
    let json = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok((key.len() + json.len()) as u64)
}

fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
