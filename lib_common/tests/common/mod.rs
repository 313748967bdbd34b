//! In-memory connector and recording sinks shared by the integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lib_common::{Connector, DisplaySink, DisplayView, FeedError, LineSink, Link, Notice, TransportEvent};
use tokio::sync::mpsc;

pub const HEARTBEAT: &str = r#"[null,"7","phoenix","heartbeat",{}]"#;

/// The far end of one link opened by [`MemoryConnector`].
pub struct Remote {
    /// Frames the client sent.
    pub sent: mpsc::UnboundedReceiver<String>,
    /// Events to push at the client.
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl Remote {
    pub fn push(&self, raw: &str) {
        self.events.send(TransportEvent::Message(raw.to_string())).expect("client still listening");
    }

    pub fn close(&self) {
        let _ = self.events.send(TransportEvent::Closed);
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.events.send(TransportEvent::Error(reason.to_string()));
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(600), self.sent.recv()).await.ok().flatten()
    }
}

/// Hands out channel-backed links and reports their far ends.
pub struct MemoryConnector {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    remotes: mpsc::UnboundedSender<Remote>,
}

impl MemoryConnector {
    /// A connector whose first `failures` attempts are refused.
    pub fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<Remote>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            remotes: tx,
        };
        (connector, rx)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Link, FeedError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(FeedError::Connect {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let _ = self.remotes.send(Remote { sent: out_rx, events: event_tx });
        Ok(Link::new(out_tx, event_rx))
    }
}

/// Display that records everything and signals each render.
pub struct RecordingDisplay {
    pub views: Mutex<Vec<DisplayView>>,
    pub notices: Mutex<Vec<Notice>>,
    rendered: mpsc::UnboundedSender<DisplayView>,
}

impl RecordingDisplay {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DisplayView>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let display = Self {
            views: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            rendered: tx,
        };
        (display, rx)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render(&self, view: &DisplayView) {
        self.views.lock().unwrap().push(view.clone());
        let _ = self.rendered.send(view.clone());
    }

    fn notice(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}

/// In-memory line sink.
#[derive(Default)]
pub struct MemoryLines(pub Mutex<Vec<String>>);

impl MemoryLines {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl LineSink for MemoryLines {
    fn append_line(&self, line: &str) -> io::Result<()> {
        self.0.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Line sink whose every write fails, like a full disk.
pub struct FailingLines;

impl LineSink for FailingLines {
    fn append_line(&self, _line: &str) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}
