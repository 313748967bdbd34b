//! # Reconnect Supervisor
//!
//! The top-level control loop. It owns the [`SessionCounters`] so they survive
//! reconnects, runs one [`ConnectionSession`] at a time, and after every
//! session ends (for whatever reason) waits briefly and starts the next one.
//! It never gives up; only [`ReconnectSupervisor::shutdown`] stops it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::FeedConfig;
use super::session::{ConnectionSession, EndReason, SessionCounters, SharedCounters};
use super::sinks::{Notice, Sinks};
use super::transport::Connector;

/// Delay schedule between sessions.
///
/// With `max == base` every reconnect waits `base`. With a larger `max`, each
/// consecutive session that failed to join doubles the wait, up to `max`; a
/// session that joined resets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after a session that joined, and after the first failure.
    pub base: Duration,
    /// Upper bound.
    pub max: Duration,
}

impl ReconnectPolicy {
    /// The same delay every time.
    pub fn fixed(delay: Duration) -> Self {
        Self { base: delay, max: delay }
    }

    /// Delay to apply after `consecutive_failures` sessions in a row ended
    /// without joining.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        let doublings = consecutive_failures.saturating_sub(1).min(16);
        self.base.saturating_mul(1u32 << doublings).min(self.max).max(self.base)
    }
}

impl From<&FeedConfig> for ReconnectPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            base: config.reconnect_delay,
            max: config.reconnect_max_delay,
        }
    }
}

/// Cloneable handle that stops a running supervisor.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    /// Stops the active session and prevents new ones.
    pub fn shutdown(&self) {
        self.0.cancel();
    }

    /// Whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Keeps one feed connection alive forever.
pub struct ReconnectSupervisor {
    config: Arc<FeedConfig>,
    connector: Arc<dyn Connector>,
    counters: SharedCounters,
    sinks: Sinks,
    policy: ReconnectPolicy,
    shutdown: CancellationToken,
}

impl ReconnectSupervisor {
    /// Creates a supervisor with fresh counters sized from `config`.
    pub fn new(config: FeedConfig, connector: Arc<dyn Connector>, sinks: Sinks) -> Self {
        let counters = Arc::new(Mutex::new(SessionCounters::new(config.max_recent_messages)));
        let policy = ReconnectPolicy::from(&config);
        Self {
            config: Arc::new(config),
            connector,
            counters,
            sinks,
            policy,
            shutdown: CancellationToken::new(),
        }
    }

    /// Handle to the counters shared by every session.
    pub fn counters(&self) -> SharedCounters {
        Arc::clone(&self.counters)
    }

    /// A handle that can stop this supervisor from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Stops the active session and suppresses further sessions.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Runs sessions back to back until shutdown. Returns how many sessions
    /// were started.
    pub async fn run(&self) -> u64 {
        let mut session_id = 0u64;
        let mut consecutive_failures = 0u32;

        log::info!("Reconnect supervisor started for {}", self.config.socket_url);

        while !self.shutdown.is_cancelled() {
            session_id += 1;
            let session = ConnectionSession::new(
                session_id,
                Arc::clone(&self.config),
                Arc::clone(&self.counters),
                self.sinks.clone(),
            );
            let end = session.run(self.connector.as_ref(), &self.shutdown).await;

            if end.reason == EndReason::Shutdown || self.shutdown.is_cancelled() {
                break;
            }

            consecutive_failures = if end.joined { 0 } else { consecutive_failures.saturating_add(1) };
            let delay = self.policy.delay_after(consecutive_failures);

            log::warn!(
                "Session {} ended ({}). Reconnecting in {} ms...",
                end.session_id,
                end.reason,
                delay.as_millis()
            );
            self.sinks.display.notice(&Notice::Reconnecting { delay });

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        log::info!("Reconnect supervisor stopped after {} session(s).", session_id);
        session_id
    }
}
