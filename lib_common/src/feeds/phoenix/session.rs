//! # Connection Session
//!
//! One session owns one physical connection from dial to teardown:
//!
//! ```text
//! Disconnected ──new──▶ Connecting ──open──▶ Joined ──error/close──▶ Closing ──▶ Disconnected
//!                            └──────────error/close──────────────────▲
//! ```
//!
//! Every transport callback is turned into a [`SessionEvent`] and dispatched
//! through [`ConnectionSession::handle`], the only place state changes. A
//! session is single-use; the supervisor builds a new one for each attempt.
//!
//! Decode failures and facts without an amount are reported to the display
//! but never end a session. Only transport errors, remote closes and shutdown
//! do.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::codec::{self, encode_heartbeat, encode_join};
use super::config::FeedConfig;
use super::error::FeedError;
use super::facts::{classify, Classification};
use super::heartbeat::HeartbeatScheduler;
use super::sinks::{DisplayView, Notice, Sinks};
use super::transport::{Connector, TransportEvent};

/// Lifecycle state of a [`ConnectionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected. Both the initial and the terminal state.
    Disconnected,
    /// Dialling the endpoint.
    Connecting,
    /// Channels joined, heartbeats running.
    Joined,
    /// Tearing down after an error, a remote close or a shutdown request.
    Closing,
}

impl ConnectionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Joined)
                | (Connecting, Closing)
                | (Joined, Closing)
                | (Closing, Disconnected)
        )
    }
}

/// Message counters that outlive individual sessions.
#[derive(Debug, Clone)]
pub struct SessionCounters {
    total_messages: u64,
    recent: VecDeque<String>,
    capacity: usize,
}

impl SessionCounters {
    /// Empty counters keeping at most `capacity` recent messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            total_messages: 0,
            recent: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Counts `raw` and pushes it onto the recent window, evicting the oldest.
    pub fn record(&mut self, raw: &str) {
        self.total_messages += 1;
        if self.capacity == 0 {
            return;
        }
        while self.recent.len() >= self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(raw.to_string());
    }

    /// Messages received since the process started.
    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    /// The recent window, oldest first.
    pub fn recent_messages(&self) -> impl Iterator<Item = &str> {
        self.recent.iter().map(String::as_str)
    }

    /// Snapshot for the display.
    pub fn view(&self) -> DisplayView {
        DisplayView {
            total_messages: self.total_messages,
            recent_messages: self.recent.iter().cloned().collect(),
            max_to_show: self.capacity,
        }
    }
}

/// Handle to the counters shared between the supervisor and its sessions.
pub type SharedCounters = Arc<Mutex<SessionCounters>>;

fn lock_counters(counters: &SharedCounters) -> MutexGuard<'_, SessionCounters> {
    // The counters stay consistent even if a holder panicked: `record` cannot fail halfway.
    counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Connect failure, send failure, abnormal close or inactivity.
    Error(String),
    /// The remote end closed the connection.
    RemoteClose,
    /// Shutdown was requested.
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Error(e) => write!(f, "error: {}", e),
            EndReason::RemoteClose => write!(f, "closed by remote"),
            EndReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Outcome reported to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    /// Supervisor-assigned session number.
    pub session_id: u64,
    /// Why it ended.
    pub reason: EndReason,
    /// Whether the session ever reached [`ConnectionState::Joined`].
    pub joined: bool,
    /// Inbound messages handled by this session.
    pub messages: u64,
}

/// Transport callbacks, as seen by the state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// The link is open; frames go out through this sender.
    Opened(mpsc::UnboundedSender<String>),
    /// A text frame arrived.
    Message(String),
    /// The heartbeat schedule put one keep-alive on the wire.
    HeartbeatSent,
    /// The transport failed.
    TransportError(String),
    /// The remote end closed the connection.
    RemoteClose,
    /// Shutdown was requested.
    Shutdown,
}

/// One physical connection and its state machine.
pub struct ConnectionSession {
    id: u64,
    state: ConnectionState,
    config: Arc<FeedConfig>,
    counters: SharedCounters,
    sinks: Sinks,
    heartbeat: HeartbeatScheduler,
    outbound: Option<mpsc::UnboundedSender<String>>,
    beats: Option<mpsc::UnboundedReceiver<()>>,
    joined: bool,
    messages: u64,
    end_reason: Option<EndReason>,
}

impl ConnectionSession {
    /// Creates session `id`. Construction begins the connection attempt, so
    /// the session starts out in [`ConnectionState::Connecting`].
    pub fn new(id: u64, config: Arc<FeedConfig>, counters: SharedCounters, sinks: Sinks) -> Self {
        let mut session = Self {
            id,
            state: ConnectionState::Disconnected,
            config,
            counters,
            sinks,
            heartbeat: HeartbeatScheduler::new(),
            outbound: None,
            beats: None,
            joined: false,
            messages: 0,
            end_reason: None,
        };
        session.advance(ConnectionState::Connecting);
        session
    }

    /// Supervisor-assigned session number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the heartbeat schedule is active.
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    fn advance(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            log::error!("[session {}] Illegal transition {:?} -> {:?}", self.id, self.state, next);
            return false;
        }
        log::debug!("[session {}] {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        true
    }

    /// Transition function: applies one transport event.
    pub fn handle(&mut self, event: SessionEvent) {
        match (self.state, event) {
            (ConnectionState::Connecting, SessionEvent::Opened(outbound)) => self.on_open(outbound),
            (ConnectionState::Joined, SessionEvent::Message(raw)) => self.on_message(&raw),
            (ConnectionState::Joined, SessionEvent::HeartbeatSent) => {
                self.sinks.display.notice(&Notice::HeartbeatSent);
            }
            (ConnectionState::Connecting | ConnectionState::Joined, SessionEvent::TransportError(e)) => {
                self.begin_close(EndReason::Error(e))
            }
            (ConnectionState::Connecting | ConnectionState::Joined, SessionEvent::RemoteClose) => {
                self.begin_close(EndReason::RemoteClose)
            }
            (ConnectionState::Connecting | ConnectionState::Joined, SessionEvent::Shutdown) => {
                self.begin_close(EndReason::Shutdown)
            }
            (state, event) => {
                log::warn!("[session {}] Ignoring {:?} in state {:?}", self.id, event, state);
            }
        }
    }

    fn on_open(&mut self, outbound: mpsc::UnboundedSender<String>) {
        log::info!("[session {}] Connected to {}", self.id, self.config.socket_url);
        self.sinks.display.notice(&Notice::Connected {
            session: self.id,
            url: self.config.socket_url.clone(),
        });

        let topics = self.config.topics();
        if let Err(e) = send_joins(&outbound, &topics) {
            self.begin_close(EndReason::Error(e.to_string()));
            return;
        }
        self.sinks.display.notice(&Notice::JoinSent { topics: topics.to_vec() });

        if !self.advance(ConnectionState::Joined) {
            return;
        }
        self.joined = true;

        match codec::serialize(&encode_heartbeat()) {
            Ok(beat) => {
                // The timer task only reports beats; the display is written from here.
                let tx = outbound.clone();
                let (beat_tx, beat_rx) = mpsc::unbounded_channel();
                self.heartbeat.start(self.config.heartbeat_interval, move || {
                    tx.send(beat.clone()).map_err(|_| FeedError::Send)?;
                    let _ = beat_tx.send(());
                    Ok(())
                });
                self.beats = Some(beat_rx);
            }
            Err(e) => log::error!("[session {}] Heartbeat frame unavailable: {}", self.id, e),
        }
        self.outbound = Some(outbound);
    }

    fn on_message(&mut self, raw: &str) {
        let view = {
            let mut counters = lock_counters(&self.counters);
            counters.record(raw);
            counters.view()
        };
        self.messages += 1;

        self.sinks.display.render(&view);
        self.sinks.append_raw(raw);

        let classification = classify(&codec::decode(raw));
        self.report(&classification, raw);

        if let Some(fact) = classification.extracted_fact() {
            self.sinks.append_amount(fact.value);
        }
    }

    fn report(&self, classification: &Classification, raw: &str) {
        let notice = match classification {
            Classification::Reward => Notice::Reward { raw: raw.to_string() },
            Classification::Fact { total_raised: Some(total) } => Notice::Fact {
                raw: raw.to_string(),
                total_raised: *total,
            },
            Classification::Fact { total_raised: None } => {
                log::warn!("[session {}] Fact without a usable totalAmountRaised: {}", self.id, raw);
                Notice::FactWithoutAmount { raw: raw.to_string() }
            }
            Classification::Other(event) => Notice::OtherEvent { event: event.clone() },
            Classification::Malformed(malformed) => {
                log::warn!("[session {}] {}", self.id, malformed);
                Notice::Malformed { reason: malformed.reason.clone() }
            }
        };
        self.sinks.display.notice(&notice);
    }

    fn begin_close(&mut self, reason: EndReason) {
        if self.advance(ConnectionState::Closing) {
            self.heartbeat.stop();
            self.end_reason = Some(reason);
        }
    }

    /// Completes `Closing -> Disconnected`: stops the heartbeat, releases the
    /// outbound channel and reports the outcome.
    pub fn finish(mut self) -> SessionEnd {
        self.heartbeat.stop();
        self.outbound = None;
        self.beats = None;

        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Joined) {
            self.begin_close(EndReason::Error("session ended without a close event".to_string()));
        }
        self.advance(ConnectionState::Disconnected);

        let reason = self
            .end_reason
            .take()
            .unwrap_or_else(|| EndReason::Error("session ended without a close event".to_string()));

        log::info!("[session {}] Ended after {} message(s): {}", self.id, self.messages, reason);
        self.sinks.display.notice(&Notice::Closed {
            session: self.id,
            reason: reason.clone(),
        });

        SessionEnd {
            session_id: self.id,
            reason,
            joined: self.joined,
            messages: self.messages,
        }
    }

    /// Drives the session to completion: connect, join, pump inbound events
    /// until the link ends or `shutdown` fires.
    pub async fn run(mut self, connector: &dyn Connector, shutdown: &CancellationToken) -> SessionEnd {
        let url = self.config.socket_url.clone();
        log::info!("[session {}] Connecting to {}", self.id, url);
        self.sinks.display.notice(&Notice::Connecting { session: self.id, url: url.clone() });

        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            res = connector.connect(&url) => Some(res),
        };

        let mut link = match connected {
            None => {
                self.handle(SessionEvent::Shutdown);
                return self.finish();
            }
            Some(Err(e)) => {
                log::error!("[session {}] {}", self.id, e);
                self.handle(SessionEvent::TransportError(e.to_string()));
                return self.finish();
            }
            Some(Ok(link)) => link,
        };

        self.handle(SessionEvent::Opened(link.outbound.clone()));

        let inactivity = self.config.inactivity_timeout;
        let mut last_activity = Instant::now();
        let mut beats = self.beats.take();

        while self.state == ConnectionState::Joined {
            let deadline = inactivity.map(|limit| last_activity + limit);
            let watchdog = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => SessionEvent::Shutdown,
                Some(()) = next_beat(&mut beats) => SessionEvent::HeartbeatSent,
                inbound = link.inbound.recv() => match inbound {
                    Some(TransportEvent::Message(raw)) => {
                        last_activity = Instant::now();
                        SessionEvent::Message(raw)
                    }
                    Some(TransportEvent::Error(e)) => SessionEvent::TransportError(e),
                    Some(TransportEvent::Closed) | None => SessionEvent::RemoteClose,
                },
                _ = watchdog => {
                    log::warn!(
                        "[session {}] No inbound data for {}s. Reconnecting...",
                        self.id,
                        inactivity.map(|d| d.as_secs()).unwrap_or_default()
                    );
                    SessionEvent::TransportError("inactivity timeout".to_string())
                }
            };
            self.handle(event);
        }

        let end = self.finish();
        drop(link);
        end
    }
}

async fn next_beat(beats: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match beats {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn send_joins(outbound: &mpsc::UnboundedSender<String>, topics: &[String; 2]) -> Result<(), FeedError> {
    for frame in encode_join(&topics[0], &topics[1])? {
        outbound.send(codec::serialize(&frame)?).map_err(|_| FeedError::Send)?;
    }
    Ok(())
}
