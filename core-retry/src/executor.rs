//! # Retry Executor
//!
//! Runs an async remote operation with exponential backoff.
//!
//! Attempts are strictly sequential. Between attempts the executor sleeps
//! without blocking the runtime, racing the sleep against the caller's
//! [`CancellationToken`]. [`RetryExecutor::execute_with_retry`] never fails out
//! of band: it always returns a [`RetryOutcome`] describing what happened.

use crate::config::{RetryAttempt, RetryOptions, RetryProfile};
use crate::error::{RemoteError, RetryError};
use core_runtime::events::{CoreEvent, EventBus, RetryEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Result of a retried operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub operation: String,
    /// Value of the successful attempt, or the last error
    pub result: Result<T, RemoteError>,
    /// Attempts actually started
    pub attempts: u32,
    /// Wall time from the first attempt to the outcome, delays included
    pub total_time: Duration,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.result, Err(RemoteError::Cancelled))
    }

    pub fn error(&self) -> Option<&RemoteError> {
        self.result.as_ref().err()
    }

    /// Convert into a plain `Result`, re-raising the failure as [`RetryError`].
    pub fn into_result(self) -> Result<T, RetryError> {
        match self.result {
            Ok(value) => Ok(value),
            Err(RemoteError::Cancelled) => Err(RetryError::Cancelled {
                name: self.operation,
                attempts: self.attempts,
            }),
            Err(source) => Err(RetryError::Exhausted {
                name: self.operation,
                attempts: self.attempts,
                source,
            }),
        }
    }
}

/// Retry-with-backoff wrapper shared by every remote call site.
///
/// Cheap to clone; the only state is the optional event bus.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    event_bus: Option<Arc<EventBus>>,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set event bus for retry activity events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: RetryEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Retry(event)).ok();
        }
    }

    /// Run `operation` until it succeeds, the predicate declines the error,
    /// attempts run out, or `token` is cancelled.
    ///
    /// The token is checked before every attempt and raced against every
    /// delay; an in-flight attempt is not interrupted.
    #[instrument(skip(self, operation, options, token), fields(max_attempts = options.max_attempts))]
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut operation: F,
        name: &str,
        options: &RetryOptions,
        token: &CancellationToken,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let started = Instant::now();
        let max_attempts = options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if token.is_cancelled() {
                return self.cancelled(name, attempt, started);
            }

            attempt += 1;

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation = name, attempts = attempt, "Operation succeeded after retry");
                    } else {
                        debug!(operation = name, "Operation succeeded");
                    }
                    options.notify_success(attempt);
                    self.emit(RetryEvent::Succeeded {
                        operation: name.to_string(),
                        attempts: attempt,
                    });
                    return RetryOutcome {
                        operation: name.to_string(),
                        result: Ok(value),
                        attempts: attempt,
                        total_time: started.elapsed(),
                    };
                }
                Err(error) => error,
            };

            if error.is_cancelled() {
                return self.cancelled(name, attempt, started);
            }

            let retryable = options.should_retry(&error);
            if !retryable || attempt >= max_attempts {
                warn!(
                    operation = name,
                    attempts = attempt,
                    retryable,
                    error = %error,
                    "Operation failed"
                );
                options.notify_failure(&error, attempt);
                self.emit(RetryEvent::Exhausted {
                    operation: name.to_string(),
                    attempts: attempt,
                    error: error.to_string(),
                });
                return RetryOutcome {
                    operation: name.to_string(),
                    result: Err(error),
                    attempts: attempt,
                    total_time: started.elapsed(),
                };
            }

            let delay = options.delay_for_attempt(attempt);
            warn!(
                operation = name,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            self.emit(RetryEvent::AttemptFailed {
                operation: name.to_string(),
                attempt,
                max_attempts,
                delay_ms: delay.as_millis() as u64,
                error: error.to_string(),
            });
            options.notify_retry(&RetryAttempt {
                attempt,
                delay,
                error,
            });

            tokio::select! {
                _ = token.cancelled() => return self.cancelled(name, attempt, started),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled<T>(&self, name: &str, attempts: u32, started: Instant) -> RetryOutcome<T> {
        info!(operation = name, attempts, "Operation cancelled");
        self.emit(RetryEvent::Cancelled {
            operation: name.to_string(),
            attempts,
        });
        RetryOutcome {
            operation: name.to_string(),
            result: Err(RemoteError::Cancelled),
            attempts,
            total_time: started.elapsed(),
        }
    }

    /// Run with a preset profile and re-raise failure as [`RetryError`].
    pub async fn run_profile<T, F, Fut>(
        &self,
        profile: RetryProfile,
        operation: F,
        name: &str,
        token: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.execute_with_retry(operation, name, &profile.options(), token)
            .await
            .into_result()
    }

    /// Reads and ordinary writes ([`RetryProfile::RemoteData`]).
    pub async fn remote_data_operation<T, F, Fut>(
        &self,
        operation: F,
        name: &str,
        token: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.run_profile(RetryProfile::RemoteData, operation, name, token)
            .await
    }

    /// Media uploads ([`RetryProfile::FileUpload`]).
    pub async fn file_upload_operation<T, F, Fut>(
        &self,
        operation: F,
        name: &str,
        token: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.run_profile(RetryProfile::FileUpload, operation, name, token)
            .await
    }

    /// Writes that must not be lost ([`RetryProfile::Critical`]).
    pub async fn critical_operation<T, F, Fut>(
        &self,
        operation: F,
        name: &str,
        token: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.run_profile(RetryProfile::Critical, operation, name, token)
            .await
    }
}
