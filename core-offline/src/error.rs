use bridge_traits::BridgeError;
use core_retry::RetryConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Invalid offline queue configuration: {0}")]
    Config(String),

    #[error("Invalid replay retry options: {0}")]
    ReplayRetry(#[from] RetryConfigError),

    #[error("Durable storage error: {0}")]
    Storage(#[from] BridgeError),

    #[error("Queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OfflineError {
    /// Whether the durable store rejected a write for lack of room.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, OfflineError::Storage(err) if err.is_quota_exceeded())
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
