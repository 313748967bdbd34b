//! # lib_common
//!
//! Shared building blocks for the Tiltify feed monitor. Each top-level folder
//! is gated behind a cargo feature of the same name, so binaries only compile
//! what they use.

// Declare the modules to re-export
#[cfg(feature = "loggers")]
pub mod loggers; // Append-only line files (raw message log, amount log)
#[cfg(feature = "feeds")]
pub mod feeds;   // Real-time feed clients

// Re-export everything
#[cfg(feature = "loggers")]
pub use loggers::appendlog::*;
#[cfg(feature = "feeds")]
pub use feeds::phoenix::*;
