//! Display and log sink seams.
//!
//! The session never renders or writes files itself. It hands the current
//! counters and per-frame notices to a [`DisplaySink`], and complete lines to
//! the two [`LineSink`]s.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::loggers::appendlog::{timestamped, LineSink};

use super::session::EndReason;

/// Snapshot handed to [`DisplaySink::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayView {
    /// Messages received since the process started, across reconnects.
    pub total_messages: u64,
    /// The most recent raw messages, oldest first.
    pub recent_messages: Vec<String>,
    /// How many recent messages the display should show.
    pub max_to_show: usize,
}

/// One-line status reports for the display.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A connection attempt is starting.
    Connecting {
        /// Supervisor-assigned session number.
        session: u64,
        /// Endpoint being dialled.
        url: String,
    },
    /// The transport is open.
    Connected {
        /// Supervisor-assigned session number.
        session: u64,
        /// Endpoint that answered.
        url: String,
    },
    /// Join frames went out for these topics.
    JoinSent {
        /// Joined topics, in send order.
        topics: Vec<String>,
    },
    /// A keep-alive went out.
    HeartbeatSent,
    /// A reward notification arrived.
    Reward {
        /// The frame as received.
        raw: String,
    },
    /// A fact carrying a running total arrived.
    Fact {
        /// The frame as received.
        raw: String,
        /// Extracted total, whole units.
        total_raised: i64,
    },
    /// A fact arrived without a usable amount.
    FactWithoutAmount {
        /// The frame as received.
        raw: String,
    },
    /// Some other event arrived.
    OtherEvent {
        /// The event discriminator.
        event: String,
    },
    /// The inbound text could not be decoded.
    Malformed {
        /// Decoder description.
        reason: String,
    },
    /// A session ended.
    Closed {
        /// Supervisor-assigned session number.
        session: u64,
        /// Why it ended.
        reason: EndReason,
    },
    /// The next session starts after `delay`.
    Reconnecting {
        /// Wait before the next attempt.
        delay: Duration,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connecting { session, url } => write!(f, "Connecting to {} (session {})", url, session),
            Notice::Connected { session, url } => write!(f, "Connected to WebSocket at {} (session {})", url, session),
            Notice::JoinSent { topics } => write!(f, "Sent join message for {}.", topics.join(", ")),
            Notice::HeartbeatSent => write!(f, "Sent heartbeat."),
            Notice::Reward { raw } => write!(f, "Reward message received: {}", raw),
            Notice::Fact { raw, total_raised } => {
                write!(f, "Fact message received: {}\nTotal amount raised: ${}", raw, total_raised)
            }
            Notice::FactWithoutAmount { raw } => {
                write!(f, "Fact message received: {}\nNo totalAmountRaised found in fact data.", raw)
            }
            Notice::OtherEvent { event } => write!(f, "Other message type: {}", event),
            Notice::Malformed { reason } => write!(f, "Error parsing message: {}", reason),
            Notice::Closed { session, reason } => write!(f, "WebSocket connection closed (session {}): {}", session, reason),
            Notice::Reconnecting { delay } => write!(f, "Reconnecting to WebSocket in {} ms...", delay.as_millis()),
        }
    }
}

/// The presentation surface.
///
/// Calls arrive from the active session's task one at a time.
pub trait DisplaySink: Send + Sync {
    /// Clears and redraws the counters.
    fn render(&self, view: &DisplayView);
    /// Reports a single status line.
    fn notice(&self, notice: &Notice);
}

/// Everything a session writes to, shared across reconnects.
#[derive(Clone)]
pub struct Sinks {
    /// Presentation surface.
    pub display: Arc<dyn DisplaySink>,
    /// One line per inbound message, whatever its content.
    pub raw_log: Arc<dyn LineSink>,
    /// One line per extracted running total.
    pub amount_log: Arc<dyn LineSink>,
}

impl Sinks {
    /// Appends `raw` to the raw log with a timestamp prefix.
    ///
    /// Write failures are logged; they never end the session.
    pub fn append_raw(&self, raw: &str) {
        if let Err(e) = self.raw_log.append_line(&timestamped(raw)) {
            log::warn!("Failed to append to raw message log: {}", e);
        }
    }

    /// Appends `amount` to the amount log with a timestamp prefix.
    pub fn append_amount(&self, amount: i64) {
        if let Err(e) = self.amount_log.append_line(&timestamped(&amount.to_string())) {
            log::warn!("Failed to append to amount log: {}", e);
        }
    }
}
