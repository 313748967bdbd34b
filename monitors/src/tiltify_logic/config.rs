use anyhow::{Context, Result};
use clap::Parser;
use lib_common::FeedConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "monitor_tiltify.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[clap(about = "Tiltify real-time feed monitor", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TILTIFY_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TILTIFY_LOG_DIR", help = "Directory for process log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TILTIFY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TILTIFY_SOCKET_URL", help = "Phoenix WebSocket endpoint.")]
    pub socket_url: Option<String>,

    #[clap(long, env = "TILTIFY_EVENT_ID", help = "Event group id the fact and reward channels are scoped to.")]
    pub event_id: Option<String>,

    #[clap(long, env = "TILTIFY_MAX_RECENT_MESSAGES", help = "How many recent messages to keep on screen.")]
    pub max_recent_messages: Option<usize>,

    #[clap(long, env = "TILTIFY_HEARTBEAT_INTERVAL_MS", help = "Milliseconds between heartbeat frames.")]
    pub heartbeat_interval_ms: Option<u64>,

    #[clap(long, env = "TILTIFY_RECONNECT_DELAY_MS", help = "Delay in milliseconds before reconnecting.")]
    pub reconnect_delay_ms: Option<u64>,

    #[clap(long, env = "TILTIFY_RECONNECT_MAX_DELAY_MS", help = "Maximum reconnect delay in milliseconds. Defaults to the reconnect delay (no backoff).")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "TILTIFY_INACTIVITY_TIMEOUT_MS", help = "Reconnect if nothing arrives for this many milliseconds. Disabled when unset.")]
    pub inactivity_timeout_ms: Option<u64>,

    #[clap(long, env = "TILTIFY_RAW_LOG_PATH", help = "File every raw inbound message is appended to.")]
    pub raw_log_path: Option<PathBuf>,

    #[clap(long, env = "TILTIFY_AMOUNT_LOG_PATH", help = "File every extracted amount raised is appended to.")]
    pub amount_log_path: Option<PathBuf>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            socket_url: other.socket_url.or(self.socket_url),
            event_id: other.event_id.or(self.event_id),
            max_recent_messages: other.max_recent_messages.or(self.max_recent_messages),
            heartbeat_interval_ms: other.heartbeat_interval_ms.or(self.heartbeat_interval_ms),
            reconnect_delay_ms: other.reconnect_delay_ms.or(self.reconnect_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            inactivity_timeout_ms: other.inactivity_timeout_ms.or(self.inactivity_timeout_ms),
            raw_log_path: other.raw_log_path.or(self.raw_log_path),
            amount_log_path: other.amount_log_path.or(self.amount_log_path),
        }
    }

    fn defaults() -> Config {
        let feed = FeedConfig::default();
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            socket_url: Some(feed.socket_url),
            event_id: Some(feed.event_id),
            max_recent_messages: Some(feed.max_recent_messages),
            heartbeat_interval_ms: Some(feed.heartbeat_interval.as_millis() as u64),
            reconnect_delay_ms: Some(feed.reconnect_delay.as_millis() as u64),
            raw_log_path: Some(feed.raw_log_path),
            amount_log_path: Some(feed.amount_log_path),
            ..Default::default()
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Resolves the feed client settings. Unset fields fall back to the library defaults.
    pub fn feed_config(&self) -> FeedConfig {
        let defaults = FeedConfig::default();
        let reconnect_delay = self
            .reconnect_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.reconnect_delay);

        FeedConfig {
            socket_url: self.socket_url.clone().unwrap_or(defaults.socket_url),
            event_id: self.event_id.clone().unwrap_or(defaults.event_id),
            max_recent_messages: self.max_recent_messages.unwrap_or(defaults.max_recent_messages),
            heartbeat_interval: self
                .heartbeat_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.heartbeat_interval),
            reconnect_delay,
            reconnect_max_delay: self
                .reconnect_max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(reconnect_delay),
            inactivity_timeout: self.inactivity_timeout_ms.map(Duration::from_millis),
            raw_log_path: self.raw_log_path.clone().unwrap_or(defaults.raw_log_path),
            amount_log_path: self.amount_log_path.clone().unwrap_or(defaults.amount_log_path),
        }
    }
}

fn read_config_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str::<Config>(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Layers defaults, the optional JSON file, then environment and CLI.
///
/// A file named explicitly with `--config-path` must load; the implicit
/// default file is skipped with a warning if it is unreadable.
pub fn resolve(cli: Config) -> Result<Config> {
    let mut current_config = Config::defaults();

    let explicit = cli.config_path.is_some();
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if config_file_path.exists() {
        match read_config_file(&config_file_path) {
            Ok(file_config) => current_config = current_config.merge(file_config),
            Err(e) if explicit => return Err(e),
            Err(e) => log::warn!("{:#}. Falling back to other sources.", e),
        }
    } else if explicit {
        anyhow::bail!("Config file not found: {}", config_file_path.display());
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // clap already folded environment variables into the CLI layer.
    Ok(current_config.merge(cli))
}

pub fn load_config() -> Result<Config> {
    resolve(Config::parse())
}
