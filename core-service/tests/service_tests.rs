//! Composition and lifecycle of the core service.

use async_trait::async_trait;
use bridge_traits::mock::{ManualClock, ManualConnectivity, MemoryDurableStore};
use bridge_traits::{Clock, NetworkStatus};
use core_offline::{FallbackConfig, MutationInfo, MutationReplayer, PendingOperation};
use core_retry::{RemoteError, RetryOptions};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CacheEvent, CoreEvent, QueueEvent};
use core_service::{CoreDependencies, CoreError, CoreService};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Replayer {}

    #[async_trait]
    impl MutationReplayer for Replayer {
        async fn replay(&self, operation: &PendingOperation) -> Result<(), RemoteError>;
    }
}

fn quick_replay() -> FallbackConfig {
    FallbackConfig::new().with_replay_retry(RetryOptions::new().with_max_attempts(1))
}

#[tokio::test]
async fn test_activity_log_receives_component_events() {
    let config = CoreConfig::builder()
        .durable_store(Arc::new(MemoryDurableStore::new()))
        .clock(Arc::new(ManualClock::fixed()))
        .build()
        .unwrap();
    let core = CoreService::new(CoreDependencies::new(config, Arc::new(MockReplayer::new()))).unwrap();
    let mut activity = core.activity();

    core.cache()
        .set("settings:site", json!({ "theme": "dark" }), None)
        .unwrap();

    match activity.try_recv() {
        Some(Ok(CoreEvent::Cache(CacheEvent::EntrySet { key, .. }))) => {
            assert_eq!(key, "settings:site")
        }
        other => panic!("unexpected activity: {:?}", other),
    }
}

#[tokio::test]
async fn test_activity_log_can_be_disabled() {
    let config = CoreConfig::builder()
        .durable_store(Arc::new(MemoryDurableStore::new()))
        .enable_activity_log(false)
        .build()
        .unwrap();
    let core = CoreService::new(CoreDependencies::new(config, Arc::new(MockReplayer::new()))).unwrap();
    let mut activity = core.activity();

    core.cache().set("settings:site", json!({}), None).unwrap();
    core.offline()
        .enqueue(MutationInfo::insert("contact_messages", json!({})))
        .await;

    assert!(activity.try_recv().is_none());
}

#[tokio::test]
async fn test_start_loads_persisted_queue() {
    let clock = Arc::new(ManualClock::fixed());
    let store = Arc::new(MemoryDurableStore::new());
    let op = PendingOperation::new(
        MutationInfo::insert("registrations", json!({ "event_id": "gala" })),
        clock.now(),
    );
    store.insert_raw(
        "offline_fallback_queue",
        &serde_json::to_string(&vec![op.clone()]).unwrap(),
    );

    let config = CoreConfig::builder()
        .durable_store(store)
        .clock(clock)
        .enable_background_sync(false)
        .build()
        .unwrap();
    let core = CoreService::new(CoreDependencies::new(config, Arc::new(MockReplayer::new()))).unwrap();

    core.start().await.unwrap();
    assert!(core.is_running());
    assert_eq!(core.offline().pending_operations().await, vec![op]);

    // A second start does not reload.
    core.start().await.unwrap();
    assert_eq!(core.offline().pending_count().await, 1);

    core.shutdown().await;
}

#[tokio::test]
async fn test_start_survives_unreadable_store() {
    let store = Arc::new(MemoryDurableStore::new());
    store.set_fail_reads(true);

    let config = CoreConfig::builder()
        .durable_store(store)
        .enable_background_sync(false)
        .build()
        .unwrap();
    let core = CoreService::new(CoreDependencies::new(config, Arc::new(MockReplayer::new()))).unwrap();
    let mut activity = core
        .activity()
        .filter(|event| matches!(event, CoreEvent::Queue(QueueEvent::LoadFailed { .. })));

    core.start().await.unwrap();
    assert!(core.is_running());
    assert!(activity.try_recv().is_some());
    assert_eq!(core.offline().pending_count().await, 0);

    core.shutdown().await;
}

#[tokio::test]
async fn test_network_awareness_drains_on_reconnect() {
    let mut replayer = MockReplayer::new();
    replayer.expect_replay().times(1).returning(|_| Ok(()));

    let connectivity = Arc::new(ManualConnectivity::offline());
    let config = CoreConfig::builder()
        .durable_store(Arc::new(MemoryDurableStore::new()))
        .connectivity(connectivity.clone())
        .enable_network_awareness(true)
        .build()
        .unwrap();
    let core = CoreService::new(
        CoreDependencies::new(config, Arc::new(replayer)).with_fallback_config(quick_replay()),
    )
    .unwrap();

    core.start().await.unwrap();
    assert!(!core.offline().is_online());

    let saved = core
        .offline()
        .execute_with_fallback(
            || async { Ok::<_, RemoteError>("remote") },
            || async { Ok::<_, String>("local") },
            Some(MutationInfo::insert("contact_messages", json!({ "name": "Ada" }))),
            &core.shutdown_token(),
        )
        .await;
    assert_eq!(saved, Ok("local"));

    let mut completions = core
        .activity()
        .filter(|event| matches!(event, CoreEvent::Queue(QueueEvent::SyncCompleted { .. })));

    tokio::time::sleep(Duration::from_millis(20)).await;
    connectivity.set_status(NetworkStatus::Connected);

    let completed = tokio::time::timeout(Duration::from_secs(2), completions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        completed,
        CoreEvent::Queue(QueueEvent::SyncCompleted {
            successful: 1,
            failed: 0,
            abandoned: 0,
        })
    );
    assert_eq!(core.offline().pending_count().await, 0);

    core.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_final() {
    let config = CoreConfig::builder()
        .durable_store(Arc::new(MemoryDurableStore::new()))
        .build()
        .unwrap();
    let core = CoreService::new(CoreDependencies::new(config, Arc::new(MockReplayer::new()))).unwrap();

    core.start().await.unwrap();
    core.shutdown().await;

    assert!(!core.is_running());
    assert!(core.shutdown_token().is_cancelled());
    assert!(matches!(
        core.start().await,
        Err(CoreError::InitializationFailed(_))
    ));
}

#[tokio::test]
async fn test_invalid_component_config_is_rejected() {
    let config = CoreConfig::builder()
        .durable_store(Arc::new(MemoryDurableStore::new()))
        .build()
        .unwrap();
    let deps = CoreDependencies::new(config, Arc::new(MockReplayer::new()))
        .with_fallback_config(FallbackConfig::new().with_max_replay_attempts(0));

    assert!(matches!(
        CoreService::new(deps),
        Err(CoreError::Offline(_))
    ));
}

#[cfg(feature = "desktop-shims")]
#[tokio::test]
async fn test_desktop_bootstrap() {
    let path = std::env::temp_dir().join(format!(
        "eventsite-core-{}-{}.db",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));

    let core = core_service::bootstrap_desktop(path.clone(), Arc::new(MockReplayer::new()))
        .await
        .unwrap();
    assert!(core.features().enable_network_awareness);

    core.offline()
        .enqueue(MutationInfo::update("site_settings", json!({ "theme": "light" })))
        .await;
    assert_eq!(core.offline().pending_count().await, 1);

    drop(core);
    let _ = std::fs::remove_file(path);
}
