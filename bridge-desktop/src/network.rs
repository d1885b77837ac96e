//! Connectivity Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{ConnectivitySource, NetworkChangeStream, NetworkStatus},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop connectivity monitor implementation
///
/// Detects connectivity by opening a TCP connection to a well-known address.
/// Transitions are found by polling.
///
/// Note: Platform-specific implementations (Linux netlink, macOS SystemConfiguration,
/// Windows Network List Manager) would react faster but require additional dependencies.
#[derive(Debug, Clone)]
pub struct DesktopConnectivityMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    poll_interval: Duration,
}

impl DesktopConnectivityMonitor {
    /// Create a new monitor with the default probe target
    pub fn new() -> Self {
        Self {
            probe_addr: DEFAULT_PROBE_ADDR.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Probe a different `host:port`, e.g. the backend's own endpoint
    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = addr.into();
        self
    }

    /// Set how often the change stream re-probes
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check connectivity by attempting a TCP connection
    async fn probe(&self) -> NetworkStatus {
        match tokio::time::timeout(
            self.probe_timeout,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectivitySource for DesktopConnectivityMonitor {
    async fn current_status(&self) -> Result<NetworkStatus> {
        let status = self.probe().await;
        debug!(status = ?status, addr = %self.probe_addr, "Connectivity probed");
        Ok(status)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last_status: None,
        }))
    }
}

/// Change stream that polls the probe and yields only transitions
struct DesktopNetworkChangeStream {
    monitor: DesktopConnectivityMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        loop {
            tokio::time::sleep(self.monitor.poll_interval).await;

            let status = self.monitor.probe().await;
            if self.last_status != Some(status) {
                self.last_status = Some(status);
                return Some(status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_probe_reports_disconnected() {
        // Bind then drop to get a local port with nothing listening on it.
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let monitor = DesktopConnectivityMonitor::new().with_probe_addr(addr.to_string());
        let status = monitor.current_status().await.unwrap();
        assert_eq!(status, NetworkStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_reachable_probe_reports_connected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopConnectivityMonitor::new().with_probe_addr(addr.to_string());
        assert!(monitor.is_online().await);
    }

    #[tokio::test]
    async fn test_change_stream_yields_first_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopConnectivityMonitor::new()
            .with_probe_addr(addr.to_string())
            .with_poll_interval(Duration::from_millis(10));
        let mut stream = monitor.subscribe_changes().await.unwrap();

        assert_eq!(stream.next().await, Some(NetworkStatus::Connected));
    }
}
