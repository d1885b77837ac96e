//! # Core Offline
//!
//! Offline-first execution of remote calls.
//!
//! [`OfflineFallbackQueue`] runs remote operations through the retry
//! executor while the host is online. When a mutation cannot reach the
//! backend it is recorded as a [`PendingOperation`], persisted to the
//! injected [`DurableStore`](bridge_traits::DurableStore), and replayed
//! through a [`MutationReplayer`] once connectivity returns.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_offline::{FallbackConfig, MutationInfo, OfflineFallbackQueue};
//! use serde_json::json;
//!
//! let queue = Arc::new(
//!     OfflineFallbackQueue::new(FallbackConfig::default(), store, replayer)?
//!         .with_connectivity(connectivity),
//! );
//! queue.initialize().await?;
//! let tasks = queue.clone().spawn_background_tasks(token.clone());
//!
//! let saved = queue
//!     .execute_with_fallback(
//!         || api.insert("registrations", &form),
//!         || async { Ok::<_, AppError>(form.clone()) },
//!         Some(MutationInfo::insert("registrations", json!(form))),
//!         &token,
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod fallback;
pub mod operation;
pub mod replayer;

pub use config::FallbackConfig;
pub use error::{OfflineError, Result};
pub use fallback::{OfflineFallbackQueue, SyncSummary};
pub use operation::{MutationInfo, MutationKind, PendingOperation};
pub use replayer::MutationReplayer;
