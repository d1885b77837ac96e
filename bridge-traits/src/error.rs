use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure was caused by the store running out of room.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BridgeError::QuotaExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
