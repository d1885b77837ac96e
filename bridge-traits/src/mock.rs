//! In-memory bridge implementations for tests.
//!
//! These are deterministic stand-ins for host capabilities: a map-backed
//! [`DurableStore`] with an optional byte quota and failure injection, a
//! [`ConnectivitySource`] flipped by hand, and a [`Clock`] advanced by hand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{BridgeError, Result};
use crate::network::{ConnectivitySource, NetworkChangeStream, NetworkStatus};
use crate::storage::DurableStore;
use crate::time::Clock;

/// Map-backed durable store.
#[derive(Debug, Default)]
pub struct MemoryDurableStore {
    values: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    write_count: AtomicUsize,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any write whose value is larger than `bytes` with `QuotaExceeded`.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    /// Make every subsequent write fail with `OperationFailed`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail with `NotAvailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Read a raw value without going through the async trait.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Seed a raw value without going through the async trait.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl DurableStore for MemoryDurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable(
                "memory store reads disabled".to_string(),
            ));
        }
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(
                "memory store writes disabled".to_string(),
            ));
        }

        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(BridgeError::QuotaExceeded(format!(
                    "{} bytes exceeds quota of {} bytes",
                    value.len(),
                    quota
                )));
            }
        }

        self.values.lock().insert(key.to_string(), value.to_string());
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Connectivity source driven by the test.
#[derive(Debug)]
pub struct ManualConnectivity {
    status: Mutex<NetworkStatus>,
    sender: broadcast::Sender<NetworkStatus>,
}

impl ManualConnectivity {
    pub fn new(initial: NetworkStatus) -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            status: Mutex::new(initial),
            sender,
        }
    }

    pub fn online() -> Self {
        Self::new(NetworkStatus::Connected)
    }

    pub fn offline() -> Self {
        Self::new(NetworkStatus::Disconnected)
    }

    /// Change the status and notify subscribers if it actually changed.
    pub fn set_status(&self, status: NetworkStatus) {
        let mut current = self.status.lock();
        if *current != status {
            *current = status;
            let _ = self.sender.send(status);
        }
    }
}

#[async_trait]
impl ConnectivitySource for ManualConnectivity {
    async fn current_status(&self) -> Result<NetworkStatus> {
        Ok(*self.status.lock())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(ManualChangeStream {
            receiver: self.sender.subscribe(),
        }))
    }
}

struct ManualChangeStream {
    receiver: broadcast::Receiver<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for ManualChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        loop {
            match self.receiver.recv().await {
                Ok(status) => return Some(status),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// A clock starting at a fixed, arbitrary instant.
    pub fn fixed() -> Self {
        Self {
            millis: AtomicI64::new(1_700_000_000_000),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::fixed()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn unix_timestamp_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
