//! # Feed Clients Module
//!
//! Long-running clients that hold a persistent connection to a remote event
//! feed and turn the inbound stream into domain facts.
//!
//! ## Contained Modules:
//! - **`phoenix`**: A self-healing client for Phoenix-channel WebSocket feeds
//!   (the wire protocol spoken by the Tiltify real-time API).

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Phoenix-channel WebSocket client with automatic reconnection.
pub mod phoenix;
