//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `DurableStore` using a SQLite-backed key-value table (`sqlx`)
//! - `ConnectivitySource` using a TCP reachability probe
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopConnectivityMonitor, SqliteDurableStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(SqliteDurableStore::new("data/durable.db".into()).await.unwrap());
//!     let connectivity = Arc::new(DesktopConnectivityMonitor::new());
//!
//!     // Use in core configuration
//! }
//! ```

mod durable_store;
mod network;

pub use durable_store::SqliteDurableStore;
pub use network::DesktopConnectivityMonitor;
