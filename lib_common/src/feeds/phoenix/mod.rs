//! # Phoenix Channel Feed Client
//!
//! The connection lifecycle core of the feed monitor. A [`ReconnectSupervisor`]
//! keeps exactly one [`ConnectionSession`] alive at a time. Each session joins
//! the configured channels, keeps the link alive with a [`HeartbeatScheduler`],
//! and pushes every inbound frame through the [`codec`] and the fact
//! [`classify`] step before handing the results to the display and log sinks.
//!
//! ```text
//! ReconnectSupervisor ──creates──▶ ConnectionSession ──join/heartbeat──▶ wire
//!                                        │
//!                 wire ──raw text──▶ counters ─▶ display, raw log
//!                                        └─▶ decode ─▶ classify ─▶ amount log
//! ```

/// Five-element positional frame encoding.
pub mod codec;
/// Runtime configuration of the feed client.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Classification of decoded frames and amount extraction.
pub mod facts;
/// Periodic keep-alive emission.
pub mod heartbeat;
/// One physical connection and its state machine.
pub mod session;
/// Display and log sink seams.
pub mod sinks;
/// Top-level reconnect loop.
pub mod supervisor;
/// Connector seam and the WebSocket implementation.
pub mod transport;

// --- Public API Re-exports ---
pub use codec::{Frame, MalformedFrame};
pub use config::FeedConfig;
pub use error::FeedError;
pub use facts::{classify, Classification, ExtractedFact, FactKind};
pub use heartbeat::HeartbeatScheduler;
pub use session::{
    ConnectionSession, ConnectionState, EndReason, SessionCounters, SessionEnd, SharedCounters,
};
pub use sinks::{DisplaySink, DisplayView, Notice, Sinks};
pub use supervisor::{ReconnectPolicy, ReconnectSupervisor, ShutdownHandle};
pub use transport::{Connector, Link, TransportEvent, WsConnector};
