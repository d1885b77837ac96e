//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the event site client core:
//! - Logging and tracing infrastructure
//! - Configuration management (injected host bridges, feature flags)
//! - Event bus system carrying the structured activity log
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the cache, retry and
//! offline crates depend on. It establishes the logging conventions and the
//! event broadcasting mechanism used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
