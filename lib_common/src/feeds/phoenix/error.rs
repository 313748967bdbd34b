//! Error types for the feed client.
//!
//! Only transport-level failures end a session. Decode problems are reported
//! as [`MalformedFrame`](super::codec::MalformedFrame) values and a missing
//! amount field is a display notice, so neither appears here as a control-flow
//! error.

use thiserror::Error;

/// Errors raised by the feed client.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The WebSocket handshake could not be completed.
    #[error("Failed to connect to {url}: {reason}")]
    Connect {
        /// The endpoint that was dialled.
        url: String,
        /// Underlying transport description.
        reason: String,
    },

    /// The connection failed after it was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound frame could not be queued because the link is gone.
    #[error("Failed to send frame: link closed")]
    Send,

    /// An outbound frame could not be built.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error occurred.
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}
