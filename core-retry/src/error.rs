//! # Remote and Retry Error Types

use std::time::Duration;
use thiserror::Error;

/// Failure of a single call to the hosted backend.
///
/// Collaborators map transport and SDK failures into one of these variants
/// so retryability can be decided by matching instead of string sniffing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection could not be established or was dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend did not answer in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The backend answered with a non-success status.
    #[error("HTTP {code}: {message}")]
    HttpStatus { code: u16, message: String },

    /// The request was rejected before it was sent (bad payload, missing field).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Anything the collaborator could not classify.
    #[error("{0}")]
    Unknown(String),

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,
}

impl RemoteError {
    pub fn network(message: impl Into<String>) -> Self {
        RemoteError::Network(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        RemoteError::Timeout(message.into())
    }

    pub fn http(code: u16, message: impl Into<String>) -> Self {
        RemoteError::HttpStatus {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RemoteError::Validation(message.into())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        RemoteError::Unknown(message.into())
    }

    /// HTTP status code, if the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RemoteError::Network(message)
            | RemoteError::Timeout(message)
            | RemoteError::Validation(message)
            | RemoteError::Unknown(message)
            | RemoteError::HttpStatus { message, .. } => message,
            RemoteError::Cancelled => "operation cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled)
    }
}

/// Error form of a failed [`RetryOutcome`](crate::RetryOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Attempts ran out, or the first non-retryable error stopped the run.
    #[error("{name} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        name: String,
        attempts: u32,
        source: RemoteError,
    },

    #[error("{name} cancelled after {attempts} attempt(s)")]
    Cancelled { name: String, attempts: u32 },
}

impl RetryError {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error returned by the last attempt.
    pub fn last_error(&self) -> RemoteError {
        match self {
            RetryError::Exhausted { source, .. } => source.clone(),
            RetryError::Cancelled { .. } => RemoteError::Cancelled,
        }
    }
}

/// Rejected [`RetryOptions`](crate::RetryOptions).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryConfigError {
    #[error("max_attempts must be at least 1")]
    NoAttempts,

    #[error("base_delay ({base:?}) must not exceed max_delay ({max:?})")]
    DelayOrder { base: Duration, max: Duration },

    #[error("backoff_multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let err = RemoteError::http(503, "Service Unavailable");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.message(), "Service Unavailable");
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");

        assert_eq!(RemoteError::network("reset").status(), None);
        assert_eq!(RemoteError::Cancelled.message(), "operation cancelled");
    }

    #[test]
    fn test_retry_error_display() {
        let err = RetryError::Exhausted {
            name: "submit_registration".to_string(),
            attempts: 3,
            source: RemoteError::timeout("no response after 10s"),
        };
        assert_eq!(
            err.to_string(),
            "submit_registration failed after 3 attempt(s): Request timed out: no response after 10s"
        );
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.last_error(), RemoteError::timeout("no response after 10s"));
    }
}
