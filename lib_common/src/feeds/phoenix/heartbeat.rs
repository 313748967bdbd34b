//! # Heartbeat Scheduler
//!
//! Emits one keep-alive per interval on a background task for as long as the
//! owning session is joined. The first emission happens one full interval
//! after [`HeartbeatScheduler::start`], never immediately.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::FeedError;

/// Periodic keep-alive emitter.
///
/// Dropping the scheduler stops it.
#[derive(Default)]
pub struct HeartbeatScheduler {
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    /// Creates a stopped scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts emitting: `send` is called once every `interval`.
    ///
    /// A running schedule is stopped first. If `send` fails the link is gone,
    /// so the schedule ends on its own.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, interval: Duration, mut send: F)
    where
        F: FnMut() -> Result<(), FeedError> + Send + 'static,
    {
        self.stop();

        let token = CancellationToken::new();
        let task_token = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if task_token.is_cancelled() {
                            break;
                        }
                        if let Err(e) = send() {
                            log::warn!("Heartbeat not sent, stopping schedule: {}", e);
                            break;
                        }
                        log::debug!("Sent heartbeat.");
                    }
                }
            }
        });

        self.cancel = Some(token);
        self.task = Some(task);
    }

    /// Cancels all future emissions. Calling it on a stopped scheduler is a no-op.
    ///
    /// On a multi-thread runtime a tick that is already running when `stop`
    /// is called may still complete one `send`. That frame lands in the
    /// session's own outbound channel, which is dropped with the session, so
    /// nothing reaches a later connection.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether a schedule is active.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
