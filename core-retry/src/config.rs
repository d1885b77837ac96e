//! Retry options and call-site profiles

use crate::condition::{default_retry_condition, upload_retry_condition};
use crate::error::{RemoteError, RetryConfigError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type RetryCondition = Arc<dyn Fn(&RemoteError) -> bool + Send + Sync>;
pub type RetryObserver = Arc<dyn Fn(&RetryAttempt) + Send + Sync>;
pub type SuccessObserver = Arc<dyn Fn(u32) + Send + Sync>;
pub type FailureObserver = Arc<dyn Fn(&RemoteError, u32) + Send + Sync>;

/// A failed attempt that will be followed by another one.
///
/// Handed to the `on_retry` observer and not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based number of the attempt that failed
    pub attempt: u32,
    /// Wait before the next attempt
    pub delay: Duration,
    pub error: RemoteError,
}

/// Backoff schedule, retry predicate and observers for one call.
#[derive(Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts including the first (default: 3)
    pub max_attempts: u32,
    /// Delay after the first failure (default: 1s)
    pub base_delay: Duration,
    /// Delay cap (default: 10s)
    pub max_delay: Duration,
    /// Growth factor per attempt (default: 2.0)
    pub backoff_multiplier: f64,
    retry_condition: RetryCondition,
    on_retry: Option<RetryObserver>,
    on_success: Option<SuccessObserver>,
    on_failure: Option<FailureObserver>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            retry_condition: Arc::new(default_retry_condition),
            on_retry: None,
            on_success: None,
            on_failure: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("on_retry", &self.on_retry.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Replace the retryability predicate.
    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&RemoteError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }

    /// Called after each failed attempt that will be retried.
    pub fn with_on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryAttempt) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Called once with the attempt count when the operation succeeds.
    pub fn with_on_success<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(observer));
        self
    }

    /// Called once with the last error when the operation fails for good.
    pub fn with_on_failure<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RemoteError, u32) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(observer));
        self
    }

    /// `min(base * multiplier^(attempt - 1), max)` for a 1-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let seconds = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn should_retry(&self, err: &RemoteError) -> bool {
        (self.retry_condition)(err)
    }

    pub(crate) fn notify_retry(&self, attempt: &RetryAttempt) {
        if let Some(observer) = &self.on_retry {
            observer(attempt);
        }
    }

    pub(crate) fn notify_success(&self, attempts: u32) {
        if let Some(observer) = &self.on_success {
            observer(attempts);
        }
    }

    pub(crate) fn notify_failure(&self, err: &RemoteError, attempts: u32) {
        if let Some(observer) = &self.on_failure {
            observer(err, attempts);
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError::NoAttempts);
        }

        if self.base_delay > self.max_delay {
            return Err(RetryConfigError::DelayOrder {
                base: self.base_delay,
                max: self.max_delay,
            });
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(RetryConfigError::InvalidMultiplier(self.backoff_multiplier));
        }

        Ok(())
    }
}

/// Preset options for the three kinds of remote call the client makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryProfile {
    /// Reads and ordinary writes: 3 attempts, 1s to 5s, x2
    RemoteData,
    /// Media uploads: 5 attempts, 2s to 15s, x1.5, upload-aware predicate
    FileUpload,
    /// Must-not-lose writes (registrations, payments): 5 attempts, 0.5s to 8s, x2
    Critical,
}

impl RetryProfile {
    pub fn name(self) -> &'static str {
        match self {
            RetryProfile::RemoteData => "remote_data",
            RetryProfile::FileUpload => "file_upload",
            RetryProfile::Critical => "critical",
        }
    }

    pub fn options(self) -> RetryOptions {
        match self {
            RetryProfile::RemoteData => RetryOptions::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(1_000))
                .with_max_delay(Duration::from_millis(5_000))
                .with_backoff_multiplier(2.0),
            RetryProfile::FileUpload => RetryOptions::new()
                .with_max_attempts(5)
                .with_base_delay(Duration::from_millis(2_000))
                .with_max_delay(Duration::from_millis(15_000))
                .with_backoff_multiplier(1.5)
                .with_retry_condition(upload_retry_condition),
            RetryProfile::Critical => RetryOptions::new()
                .with_max_attempts(5)
                .with_base_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_millis(8_000))
                .with_backoff_multiplier(2.0),
        }
    }
}

impl From<RetryProfile> for RetryOptions {
    fn from(profile: RetryProfile) -> Self {
        profile.options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = RetryOptions::default();
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.base_delay, Duration::from_secs(1));
        assert_eq!(options.max_delay, Duration::from_secs(10));
        assert_eq!(options.backoff_multiplier, 2.0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_delay_schedule() {
        let options = RetryOptions::default();
        assert_eq!(options.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(options.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(options.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(options.delay_for_attempt(5), Duration::from_secs(10));
        assert_eq!(options.delay_for_attempt(500), Duration::from_secs(10));
    }

    #[test]
    fn test_upload_profile_schedule() {
        let options = RetryProfile::FileUpload.options();
        assert_eq!(options.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(options.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(options.delay_for_attempt(3), Duration::from_millis(4_500));
        assert_eq!(options.delay_for_attempt(10), Duration::from_secs(15));
        assert!(options.should_retry(&RemoteError::unknown("upload aborted")));
    }

    #[test]
    fn test_profiles() {
        let remote = RetryProfile::RemoteData.options();
        assert_eq!(remote.max_attempts, 3);
        assert_eq!(remote.max_delay, Duration::from_secs(5));

        let critical: RetryOptions = RetryProfile::Critical.into();
        assert_eq!(critical.max_attempts, 5);
        assert_eq!(critical.base_delay, Duration::from_millis(500));
        assert_eq!(critical.max_delay, Duration::from_secs(8));
        assert!(!critical.should_retry(&RemoteError::unknown("upload aborted")));
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            RetryOptions::new().with_max_attempts(0).validate(),
            Err(RetryConfigError::NoAttempts)
        );
        assert_eq!(
            RetryOptions::new()
                .with_base_delay(Duration::from_secs(20))
                .validate(),
            Err(RetryConfigError::DelayOrder {
                base: Duration::from_secs(20),
                max: Duration::from_secs(10),
            })
        );
        assert_eq!(
            RetryOptions::new().with_backoff_multiplier(0.5).validate(),
            Err(RetryConfigError::InvalidMultiplier(0.5))
        );
        assert!(RetryOptions::new()
            .with_backoff_multiplier(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_custom_condition() {
        let options = RetryOptions::new().with_retry_condition(|err| err.status() == Some(409));
        assert!(options.should_retry(&RemoteError::http(409, "conflict")));
        assert!(!options.should_retry(&RemoteError::network("reset")));
    }
}
