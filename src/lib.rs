//! Workspace placeholder crate.
//!
//! This crate exposes the feature flags that map to the individual workspace
//! crates (`core-service` and, through it, the cache, retry and offline
//! components). Host applications can depend on `eventsite-workspace` and
//! enable the documented features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
