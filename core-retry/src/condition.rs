//! Retryability predicates

use crate::error::RemoteError;

/// Substrings that mark an unclassified failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "connection",
    "fetch",
    "econnreset",
    "econnrefused",
];

fn mentions_transient_failure(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Decide whether `err` is worth another attempt.
///
/// - 400, 401, 403, 422: never (validation or auth)
/// - 5xx, network, timeout: always
/// - validation, cancellation: never
/// - anything else: only if the message looks like a transport failure
pub fn default_retry_condition(err: &RemoteError) -> bool {
    match err {
        RemoteError::Network(_) | RemoteError::Timeout(_) => true,
        RemoteError::Validation(_) | RemoteError::Cancelled => false,
        RemoteError::HttpStatus { code, message } => match code {
            400 | 401 | 403 | 422 => false,
            code if *code >= 500 => true,
            _ => mentions_transient_failure(message),
        },
        RemoteError::Unknown(message) => mentions_transient_failure(message),
    }
}

/// [`default_retry_condition`], plus any error whose message mentions an upload.
pub fn upload_retry_condition(err: &RemoteError) -> bool {
    default_retry_condition(err)
        || (!err.is_cancelled() && err.message().to_lowercase().contains("upload"))
}
