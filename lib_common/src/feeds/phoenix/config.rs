//! Runtime configuration of the feed client.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use super::error::FeedError;

/// Tiltify's public Phoenix socket.
pub const DEFAULT_SOCKET_URL: &str = "wss://websockets.tiltify.com/socket/websocket?vsn=2.0.0";
/// Event group both channels are scoped to.
pub const DEFAULT_EVENT_ID: &str = "0478358a-c4ff-4ab0-9cc7-5f0b328df9dc";

/// Fully resolved settings for one supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub socket_url: String,
    /// Event group identifier scoping the fact and reward topics.
    pub event_id: String,
    /// Capacity of the recent-messages window.
    pub max_recent_messages: usize,
    /// Time between keep-alive frames.
    pub heartbeat_interval: Duration,
    /// Delay before the next session after a disconnect.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay. Equal to `reconnect_delay` means no growth.
    pub reconnect_max_delay: Duration,
    /// Reconnect if a joined session hears nothing for this long.
    pub inactivity_timeout: Option<Duration>,
    /// Raw message log file.
    pub raw_log_path: PathBuf,
    /// Extracted amount log file.
    pub amount_log_path: PathBuf,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            event_id: DEFAULT_EVENT_ID.to_string(),
            max_recent_messages: 5,
            heartbeat_interval: Duration::from_millis(30_000),
            reconnect_delay: Duration::from_millis(10),
            reconnect_max_delay: Duration::from_millis(10),
            inactivity_timeout: None,
            raw_log_path: PathBuf::from("./messages.log"),
            amount_log_path: PathBuf::from("./graph.log"),
        }
    }
}

impl FeedConfig {
    /// The `fact` and `reward` topics, in join order.
    pub fn topics(&self) -> [String; 2] {
        [
            format!("fact.{}.fact", self.event_id),
            format!("fact.{}.reward", self.event_id),
        ]
    }

    /// Rejects settings the client cannot run with.
    pub fn validate(&self) -> Result<(), FeedError> {
        let url = Url::parse(&self.socket_url)
            .map_err(|e| FeedError::Config(format!("socket url '{}': {}", self.socket_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FeedError::Config(format!(
                "socket url must use ws:// or wss://, got '{}'",
                url.scheme()
            )));
        }
        if self.event_id.trim().is_empty() {
            return Err(FeedError::Config("event id must not be empty".to_string()));
        }
        if self.max_recent_messages == 0 {
            return Err(FeedError::Config("maxRecentMessages must be at least 1".to_string()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(FeedError::Config("heartbeatIntervalMs must be at least 1".to_string()));
        }
        if self.reconnect_max_delay < self.reconnect_delay {
            return Err(FeedError::Config(
                "reconnectMaxDelayMs must not be smaller than reconnectDelayMs".to_string(),
            ));
        }
        Ok(())
    }
}
