//! Chronocam Common Utilities
//!
//! Shared infrastructure for all Chronocam crates:
//! - Error types, result aliases and remediation hints
//! - Exact frame-rate arithmetic for frame-accurate timelines
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
