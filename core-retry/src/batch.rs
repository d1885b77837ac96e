//! Batch execution of independently retried operations

use crate::config::RetryOptions;
use crate::error::RemoteError;
use crate::executor::{RetryExecutor, RetryOutcome};
use futures::future::{join_all, BoxFuture};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type OperationFn<T> = Box<dyn FnMut() -> BoxFuture<'static, Result<T, RemoteError>> + Send>;

/// Remote operation paired with the name used in logs and outcomes.
pub struct NamedOperation<T> {
    pub name: String,
    operation: OperationFn<T>,
}

impl<T> NamedOperation<T> {
    pub fn new<F>(name: impl Into<String>, operation: F) -> Self
    where
        F: FnMut() -> BoxFuture<'static, Result<T, RemoteError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            operation: Box::new(operation),
        }
    }
}

impl<T> fmt::Debug for NamedOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedOperation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// How a batch schedules its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// All members run at once; each retries on its own schedule
    Concurrent,
    /// Members run one after another in input order
    Sequential {
        /// Skip the remaining members after the first failure
        stop_on_failure: bool,
    },
}

/// Per-member outcomes in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<(String, RetryOutcome<T>)>,
    /// Members never started because an earlier one failed
    pub skipped: Vec<String>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(|(_, o)| o.is_success())
    }
}

impl RetryExecutor {
    /// Run every member under the same options.
    ///
    /// Members are independent: one member's failure never cancels a
    /// concurrent sibling. Cancelling `token` stops all of them.
    pub async fn execute_batch<T>(
        &self,
        operations: Vec<NamedOperation<T>>,
        options: &RetryOptions,
        mode: BatchMode,
        token: &CancellationToken,
    ) -> BatchReport<T> {
        debug!(count = operations.len(), ?mode, "Executing batch");

        let report = match mode {
            BatchMode::Concurrent => {
                let runs = operations.into_iter().map(|mut member| async move {
                    let outcome = self
                        .execute_with_retry(&mut member.operation, &member.name, options, token)
                        .await;
                    (member.name, outcome)
                });

                BatchReport {
                    outcomes: join_all(runs).await,
                    skipped: Vec::new(),
                }
            }
            BatchMode::Sequential { stop_on_failure } => {
                let mut outcomes = Vec::with_capacity(operations.len());
                let mut skipped = Vec::new();
                let mut halted = false;

                for mut member in operations {
                    if halted {
                        skipped.push(member.name);
                        continue;
                    }

                    let outcome = self
                        .execute_with_retry(&mut member.operation, &member.name, options, token)
                        .await;
                    halted = stop_on_failure && !outcome.is_success();
                    outcomes.push((member.name, outcome));
                }

                BatchReport { outcomes, skipped }
            }
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            "Batch completed"
        );

        report
    }
}
