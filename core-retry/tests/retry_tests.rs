//! Retry behaviour against a mocked backend, run on paused time so the
//! backoff schedule can be checked exactly.

use async_trait::async_trait;
use core_retry::{
    BatchMode, NamedOperation, RemoteError, RetryError, RetryExecutor, RetryOptions,
};
use core_runtime::events::{CoreEvent, EventBus, RetryEvent};
use futures::FutureExt;
use mockall::automock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[automock]
#[async_trait]
trait EventsApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<String>, RemoteError>;
    async fn submit_registration(&self, event_id: &str) -> Result<u64, RemoteError>;
    async fn upload_media(&self, file_name: &str) -> Result<String, RemoteError>;
}

fn options() -> RetryOptions {
    RetryOptions::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_backoff_multiplier(2.0)
}

/// Fails `failures` times with `error`, then answers `Ok`.
fn flaky_api(failures: u32, error: RemoteError) -> MockEventsApi {
    let calls = AtomicU32::new(0);
    let mut api = MockEventsApi::new();
    api.expect_list_events().returning(move || {
        if calls.fetch_add(1, Ordering::SeqCst) < failures {
            Err(error.clone())
        } else {
            Ok(vec!["spring-gala".to_string()])
        }
    });
    api
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_attempts_on_persistent_network_failure() {
    let mut api = MockEventsApi::new();
    api.expect_list_events()
        .times(3)
        .returning(|| Err(RemoteError::network("connection reset")));

    let started = Instant::now();
    let outcome = RetryExecutor::new()
        .execute_with_retry(|| api.list_events(), "list_events", &options(), &CancellationToken::new())
        .await;

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.result, Err(RemoteError::network("connection reset")));
    // 100ms after the first failure, 200ms after the second, none after the last
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(outcome.total_time >= Duration::from_millis(300));
    assert!(outcome.total_time < Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_not_retried() {
    let mut api = MockEventsApi::new();
    api.expect_submit_registration()
        .times(1)
        .returning(|_| Err(RemoteError::http(401, "Unauthorized")));

    let outcome = RetryExecutor::new()
        .execute_with_retry(
            || api.submit_registration("spring-gala"),
            "submit_registration",
            &options(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_time, Duration::ZERO);
    match outcome.into_result() {
        Err(RetryError::Exhausted { name, attempts, source }) => {
            assert_eq!(name, "submit_registration");
            assert_eq!(attempts, 1);
            assert_eq!(source.status(), Some(401));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() {
    let api = flaky_api(2, RemoteError::http(503, "Service Unavailable"));

    let outcome = RetryExecutor::new()
        .execute_with_retry(|| api.list_events(), "list_events", &options(), &CancellationToken::new())
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.result, Ok(vec!["spring-gala".to_string()]));
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped() {
    let api = flaky_api(3, RemoteError::timeout("gateway"));
    let options = options()
        .with_max_attempts(4)
        .with_base_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_millis(1_500));

    let outcome = RetryExecutor::new()
        .execute_with_retry(|| api.list_events(), "list_events", &options, &CancellationToken::new())
        .await;

    assert_eq!(outcome.attempts, 4);
    // 1s + 1.5s + 1.5s
    assert!(outcome.total_time >= Duration::from_millis(4_000));
    assert!(outcome.total_time < Duration::from_millis(4_500));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_backoff() {
    let mut api = MockEventsApi::new();
    api.expect_list_events()
        .times(1)
        .returning(|| Err(RemoteError::network("offline")));

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let options = options().with_base_delay(Duration::from_secs(2));
    let outcome = RetryExecutor::new()
        .execute_with_retry(|| api.list_events(), "list_events", &options, &token)
        .await;

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.total_time < Duration::from_secs(2));
    assert!(matches!(
        outcome.into_result(),
        Err(RetryError::Cancelled { attempts: 1, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_observers_see_each_stage() {
    let retries = Arc::new(Mutex::new(Vec::new()));
    let successes = Arc::new(AtomicU32::new(0));
    let failures = Arc::new(AtomicU32::new(0));

    let observed = retries.clone();
    let succeeded = successes.clone();
    let failed = failures.clone();
    let options = options()
        .with_on_retry(move |attempt| {
            observed
                .lock()
                .unwrap()
                .push((attempt.attempt, attempt.delay));
        })
        .with_on_success(move |attempts| {
            succeeded.store(attempts, Ordering::SeqCst);
        })
        .with_on_failure(move |_, attempts| {
            failed.store(attempts, Ordering::SeqCst);
        });

    let api = flaky_api(2, RemoteError::network("reset"));
    RetryExecutor::new()
        .execute_with_retry(|| api.list_events(), "list_events", &options, &CancellationToken::new())
        .await;

    assert_eq!(
        *retries.lock().unwrap(),
        vec![
            (1, Duration::from_millis(100)),
            (2, Duration::from_millis(200)),
        ]
    );
    assert_eq!(successes.load(Ordering::SeqCst), 3);
    assert_eq!(failures.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_activity_events() {
    let bus = Arc::new(EventBus::new(16));
    let mut events = bus.subscribe();
    let api = flaky_api(1, RemoteError::timeout("slow"));

    RetryExecutor::new()
        .with_event_bus(bus.clone())
        .execute_with_retry(|| api.list_events(), "list_events", &options(), &CancellationToken::new())
        .await;

    let received: Vec<CoreEvent> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    assert_eq!(
        received,
        vec![
            CoreEvent::Retry(RetryEvent::AttemptFailed {
                operation: "list_events".to_string(),
                attempt: 1,
                max_attempts: 3,
                delay_ms: 100,
                error: "Request timed out: slow".to_string(),
            }),
            CoreEvent::Retry(RetryEvent::Succeeded {
                operation: "list_events".to_string(),
                attempts: 2,
            }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_critical_profile_reraises_last_error() {
    let mut api = MockEventsApi::new();
    api.expect_submit_registration()
        .times(5)
        .returning(|_| Err(RemoteError::http(502, "Bad Gateway")));

    let err = RetryExecutor::new()
        .critical_operation(
            || api.submit_registration("spring-gala"),
            "submit_registration",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 5);
    assert_eq!(err.last_error(), RemoteError::http(502, "Bad Gateway"));
}

#[tokio::test(start_paused = true)]
async fn test_upload_profile_retries_interrupted_upload() {
    let mut api = MockEventsApi::new();
    api.expect_upload_media()
        .times(5)
        .returning(|_| Err(RemoteError::unknown("upload interrupted")));

    let started = Instant::now();
    let err = RetryExecutor::new()
        .file_upload_operation(
            || api.upload_media("gala-poster.png"),
            "upload_media",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RetryError::Exhausted {
            name: "upload_media".to_string(),
            attempts: 5,
            source: RemoteError::unknown("upload interrupted"),
        }
    );
    // 2s, 3s, 4.5s, 6.75s
    assert!(started.elapsed() >= Duration::from_millis(16_250));
}

#[tokio::test(start_paused = true)]
async fn test_remote_data_profile_does_not_retry_upload_errors() {
    let mut api = MockEventsApi::new();
    api.expect_upload_media()
        .times(1)
        .returning(|_| Err(RemoteError::unknown("upload interrupted")));

    let err = RetryExecutor::new()
        .remote_data_operation(
            || api.upload_media("gala-poster.png"),
            "upload_media",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), 1);
    assert!(matches!(err, RetryError::Exhausted { .. }));
}

fn member(name: &str, failures: u32, error: RemoteError) -> NamedOperation<String> {
    let calls = Arc::new(AtomicU32::new(0));
    let label = name.to_string();
    NamedOperation::new(name, move || {
        let calls = calls.clone();
        let error = error.clone();
        let label = label.clone();
        async move {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(error)
            } else {
                Ok(label)
            }
        }
        .boxed()
    })
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_batch_members_retry_independently() {
    let operations = vec![
        member("gallery", 1, RemoteError::network("reset")),
        member("settings", 0, RemoteError::network("unused")),
        member("contact", 1, RemoteError::http(403, "Forbidden")),
    ];

    let started = Instant::now();
    let report = RetryExecutor::new()
        .execute_batch(
            operations,
            &options(),
            BatchMode::Concurrent,
            &CancellationToken::new(),
        )
        .await;

    // gallery's single 100ms backoff is the longest member
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.all_succeeded());

    let names: Vec<&str> = report.outcomes.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["gallery", "settings", "contact"]);
    assert_eq!(report.outcomes[0].1.attempts, 2);
    assert_eq!(report.outcomes[2].1.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_batch_stops_on_failure() {
    let operations = vec![
        member("gallery", 0, RemoteError::network("unused")),
        member("contact", 5, RemoteError::validation("missing email")),
        member("settings", 0, RemoteError::network("unused")),
    ];

    let report = RetryExecutor::new()
        .execute_batch(
            operations,
            &options(),
            BatchMode::Sequential {
                stop_on_failure: true,
            },
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.skipped, vec!["settings".to_string()]);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[1].1.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_batch_runs_everything_without_stop() {
    let operations = vec![
        member("contact", 5, RemoteError::validation("missing email")),
        member("settings", 0, RemoteError::network("unused")),
    ];

    let report = RetryExecutor::new()
        .execute_batch(
            operations,
            &options(),
            BatchMode::Sequential {
                stop_on_failure: false,
            },
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
}
