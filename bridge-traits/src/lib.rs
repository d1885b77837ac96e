//! # Host Bridge Traits
//!
//! Capability traits that the host application injects into the client core.
//!
//! ## Overview
//!
//! The cache, retry and offline components never reach for runtime globals
//! (browser storage, connectivity events, wall-clock reads). Each of those is a
//! capability expressed as a trait here and handed to the component at
//! construction time, so the core can run under a desktop shell, inside a test
//! with manual time, or against any other host.
//!
//! ## Traits
//!
//! ### Storage
//! - [`DurableStore`](storage::DurableStore) - String key/value persistence that
//!   survives restarts (queue snapshots live here)
//!
//! ### Platform Integration
//! - [`ConnectivitySource`](network::ConnectivitySource) - Online/offline status
//!   and transition stream
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform-specific failures into it and report storage limits
//! as [`BridgeError::QuotaExceeded`] so callers can shed data instead of
//! failing outright.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across tasks behind an `Arc`.
//!
//! ## Testing
//!
//! Enable the `mock` feature to get [`mock::MemoryDurableStore`],
//! [`mock::ManualConnectivity`] and [`mock::ManualClock`].

pub mod error;
pub mod network;
pub mod storage;
pub mod time;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::BridgeError;

// Re-export commonly used types
pub use network::{ConnectivitySource, NetworkChangeStream, NetworkStatus};
pub use storage::DurableStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
