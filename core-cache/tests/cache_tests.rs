//! Behavioural tests for GenericCache: expiry, bounds, statistics,
//! singleflight population and the background sweep.

use bridge_traits::mock::ManualClock;
use core_cache::{CacheConfig, CacheError, GenericCache};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct EventSummary {
    id: String,
    title: String,
    seats_left: u32,
}

fn summary(id: &str) -> EventSummary {
    EventSummary {
        id: id.to_string(),
        title: format!("Workshop {}", id),
        seats_left: 12,
    }
}

fn manual_cache<V>(config: CacheConfig) -> (GenericCache<V>, Arc<ManualClock>)
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    let clock = Arc::new(ManualClock::fixed());
    let cache = GenericCache::new(config).unwrap().with_clock(clock.clone());
    (cache, clock)
}

#[test]
fn test_ttl_expiry() {
    let (cache, clock) = manual_cache(CacheConfig::default());
    cache
        .set("events:42", summary("42"), Some(Duration::from_millis(1_000)))
        .unwrap();

    clock.advance(Duration::from_millis(1_000));
    assert_eq!(cache.get("events:42"), Some(summary("42")));

    clock.advance(Duration::from_millis(1));
    assert_eq!(cache.get("events:42"), None);
    assert_eq!(cache.len(), 0);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expirations, 1);
}

#[test]
fn test_default_ttl_applies_when_none_given() {
    let (cache, clock) =
        manual_cache(CacheConfig::default().with_default_ttl(Duration::from_secs(5)));
    cache.set("settings:site", "dark".to_string(), None).unwrap();

    clock.advance(Duration::from_secs(6));
    assert!(!cache.has("settings:site"));
}

#[test]
fn test_item_count_bound_evicts_oldest_untouched() {
    let (cache, _) = manual_cache(CacheConfig::default().with_max_items(2));
    cache.set("a", summary("a"), None).unwrap();
    cache.set("b", summary("b"), None).unwrap();
    cache.set("c", summary("c"), None).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(!cache.has("a"));
    assert!(cache.has("b"));
    assert!(cache.has("c"));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_size_never_exceeds_bound() {
    let (cache, _) = manual_cache(CacheConfig::default().with_max_size_bytes(256));

    for i in 0..50 {
        cache.set(&format!("events:{}", i), summary(&i.to_string()), None).unwrap();
        assert!(cache.total_size_bytes() <= 256);
    }

    let stats = cache.stats();
    assert!(stats.evictions > 0);
    assert_eq!(stats.total_size_bytes, cache.total_size_bytes());
}

#[test]
fn test_hit_rate_accounting() {
    let (cache, _) = manual_cache(CacheConfig::default());
    assert_eq!(cache.stats().hit_rate, 0.0);

    cache.set("a", 1u32, None).unwrap();
    cache.get("a");
    cache.get("a");
    cache.get("a");
    cache.get("b");

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.75);
}

#[test]
fn test_invalidate_pattern() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.set("events:1", 1u32, None).unwrap();
    cache.set("events:2", 2u32, None).unwrap();
    cache.set("media:1", 3u32, None).unwrap();

    assert_eq!(cache.invalidate_pattern_str("^events:").unwrap(), 2);

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["media:1".to_string()]);
}

#[test]
fn test_cleanup_removes_only_expired() {
    let (cache, clock) = manual_cache(CacheConfig::default());
    cache.set("short", 1u32, Some(Duration::from_millis(10))).unwrap();
    cache.set("long", 2u32, Some(Duration::from_secs(60))).unwrap();

    clock.advance(Duration::from_millis(20));
    assert_eq!(cache.cleanup(), 1);
    assert_eq!(cache.keys(), vec!["long".to_string()]);
    assert_eq!(cache.stats().expirations, 1);
}

#[test]
fn test_clear() {
    let (cache, _) = manual_cache(CacheConfig::default());
    cache.set("a", 1u32, None).unwrap();
    cache.set("b", 2u32, None).unwrap();

    assert_eq!(cache.clear(), 2);
    assert!(cache.is_empty());
    assert_eq!(cache.total_size_bytes(), 0);
}

#[test]
fn test_activity_events() {
    let bus = Arc::new(EventBus::new(16));
    let mut events = bus.subscribe();
    let cache = GenericCache::new(CacheConfig::default().with_max_items(1))
        .unwrap()
        .with_clock(Arc::new(ManualClock::fixed()))
        .with_event_bus(bus.clone());

    cache.set("a", 1u32, None).unwrap();
    cache.set("b", 2u32, None).unwrap();

    let received: Vec<CoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            CoreEvent::Cache(CacheEvent::EntrySet {
                key: "a".to_string(),
                size_bytes: 2,
            }),
            CoreEvent::Cache(CacheEvent::EntryEvicted {
                key: "a".to_string(),
                access_count: 0,
            }),
            CoreEvent::Cache(CacheEvent::EntrySet {
                key: "b".to_string(),
                size_bytes: 2,
            }),
        ]
    );
}

#[tokio::test]
async fn test_get_or_set_returns_cached_value_without_factory() {
    let cache = GenericCache::new(CacheConfig::default()).unwrap();
    cache.set("events:count", 7u32, None).unwrap();

    let value = cache
        .get_or_set(
            "events:count",
            || async { Err::<u32, _>(anyhow::anyhow!("factory must not run")) },
            None,
        )
        .await
        .unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_get_or_set_runs_factory_once_for_concurrent_misses() {
    let cache = Arc::new(GenericCache::<u32>::new(CacheConfig::default()).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));

    let lookups = (0..8).map(|_| {
        let cache = cache.clone();
        let calls = calls.clone();
        async move {
            cache
                .get_or_set(
                    "events:count",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<u32, anyhow::Error>(42)
                    },
                    None,
                )
                .await
        }
    });

    let results = join_all(lookups).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| matches!(r, Ok(42))));
    assert_eq!(cache.get("events:count"), Some(42));
}

#[tokio::test]
async fn test_get_or_set_shares_factory_error_and_stores_nothing() {
    let cache = Arc::new(GenericCache::<u32>::new(CacheConfig::default()).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));

    let lookup = |cache: Arc<GenericCache<u32>>, calls: Arc<AtomicUsize>| async move {
        cache
            .get_or_set(
                "media:quota",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<u32, _>(anyhow::anyhow!("backend unavailable"))
                },
                None,
            )
            .await
    };

    let results = join_all((0..4).map(|_| lookup(cache.clone(), calls.clone()))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in &results {
        match result {
            Err(CacheError::Factory(err)) => assert!(err.to_string().contains("unavailable")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
    assert!(!cache.has("media:quota"));

    // The failed load is retired, so the next miss runs the factory again.
    let _ = lookup(cache.clone(), calls.clone()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_get_or_set_returns_value_too_large_to_cache() {
    let cache = GenericCache::new(CacheConfig::default().with_max_size_bytes(8)).unwrap();

    let value = cache
        .get_or_set(
            "media:caption",
            || async { Ok::<_, anyhow::Error>("a caption longer than the cache".to_string()) },
            None,
        )
        .await
        .unwrap();

    assert_eq!(value, "a caption longer than the cache");
    assert!(!cache.has("media:caption"));
}

#[tokio::test(start_paused = true)]
async fn test_background_cleanup_task() {
    let clock = Arc::new(ManualClock::fixed());
    let cache = Arc::new(
        GenericCache::new(CacheConfig::default().with_cleanup_interval(Duration::from_secs(1)))
            .unwrap()
            .with_clock(clock.clone()),
    );
    cache.set("a", 1u32, Some(Duration::from_millis(100))).unwrap();
    cache.set("b", 2u32, Some(Duration::from_millis(100))).unwrap();

    let token = CancellationToken::new();
    let handle = cache.spawn_cleanup_task(token.clone());

    clock.advance(Duration::from_millis(500));
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(cache.len(), 0);
    assert_eq!(cache.stats().expirations, 2);

    token.cancel();
    handle.await.unwrap();
}
