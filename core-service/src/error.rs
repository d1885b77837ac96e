use bridge_traits::BridgeError;
use core_cache::CacheError;
use core_offline::OfflineError;
use core_retry::RetryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Retry error: {0}")]
    Retry(#[from] RetryError),

    #[error("Offline queue error: {0}")]
    Offline(#[from] OfflineError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
