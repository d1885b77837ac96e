//! Connectivity Abstraction
//!
//! Provides online/offline status and transition events.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

impl NetworkStatus {
    /// Whether remote calls should be attempted.
    ///
    /// An indeterminate status counts as online: the remote call itself is the
    /// authoritative probe, and failing it falls through to the offline path.
    pub fn is_online(&self) -> bool {
        !matches!(self, NetworkStatus::Disconnected)
    }
}

/// Connectivity source trait
///
/// Lets the offline fallback queue:
/// - Skip remote attempts while the host reports offline
/// - Drain pending mutations as soon as connectivity returns
///
/// # Platform Support
///
/// - **Desktop**: TCP reachability probe with polling (see `bridge-desktop`)
/// - **Web**: `navigator.onLine` plus `online`/`offline` events
/// - **Mobile**: ConnectivityManager / NWPathMonitor
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::ConnectivitySource;
///
/// async fn should_sync(source: &dyn ConnectivitySource) -> bool {
///     source.is_online().await
/// }
/// ```
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    /// Get the current connectivity status
    async fn current_status(&self) -> Result<NetworkStatus>;

    /// Check if currently online
    async fn is_online(&self) -> bool {
        self.current_status()
            .await
            .map(|status| status.is_online())
            .unwrap_or(true)
    }

    /// Subscribe to connectivity transitions
    ///
    /// Returns a stream of status updates. Implementations should emit an
    /// event whenever the status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of connectivity transitions
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next status update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indeterminate_counts_as_online() {
        assert!(NetworkStatus::Connected.is_online());
        assert!(NetworkStatus::Indeterminate.is_online());
        assert!(!NetworkStatus::Disconnected.is_online());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&NetworkStatus::Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
    }
}
