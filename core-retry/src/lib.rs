//! # Core Retry
//!
//! Exponential-backoff retries for calls to the hosted backend.
//!
//! ## Overview
//!
//! [`RetryExecutor::execute_with_retry`] runs an async operation up to
//! `max_attempts` times. The delay after failed attempt `n` is
//! `min(base_delay * backoff_multiplier^(n-1), max_delay)`. A predicate
//! decides whether an error deserves another attempt; the default one
//! ([`default_retry_condition`]) refuses auth and validation failures and
//! retries transport failures and 5xx answers.
//!
//! Three presets cover the client's call sites:
//!
//! | Profile | Attempts | Base | Max | Multiplier |
//! |---------|----------|------|-----|------------|
//! | [`RetryProfile::RemoteData`] | 3 | 1s | 5s | 2.0 |
//! | [`RetryProfile::FileUpload`] | 5 | 2s | 15s | 1.5 |
//! | [`RetryProfile::Critical`] | 5 | 0.5s | 8s | 2.0 |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_retry::{RetryExecutor, RetryOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let executor = RetryExecutor::new();
//! let outcome = executor
//!     .execute_with_retry(|| api.list_events(), "list_events", &RetryOptions::default(), &token)
//!     .await;
//!
//! let events = executor
//!     .critical_operation(|| api.submit_registration(&form), "submit_registration", &token)
//!     .await?;
//! ```

pub mod batch;
pub mod condition;
pub mod config;
pub mod error;
pub mod executor;

pub use batch::{BatchMode, BatchReport, NamedOperation};
pub use condition::{default_retry_condition, upload_retry_condition};
pub use config::{RetryAttempt, RetryOptions, RetryProfile};
pub use error::{RemoteError, RetryConfigError, RetryError};
pub use executor::{RetryExecutor, RetryOutcome};
