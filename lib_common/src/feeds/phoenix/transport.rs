//! # Transport
//!
//! The session talks to the wire through a [`Link`]: an outbound text channel
//! and an inbound event stream. [`WsConnector`] produces links backed by a
//! real WebSocket; tests produce them from plain channels.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::error::FeedError;

/// Something that happened on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// The connection failed.
    Error(String),
    /// The remote end closed the connection.
    Closed,
}

/// An open connection.
///
/// Dropping the link stops inbound delivery. Outbound delivery ends once every
/// clone of `outbound` is dropped, at which point the socket is closed.
pub struct Link {
    /// Text frames to send, in order.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Inbound events, in arrival order. A closed channel means the link is gone.
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
    reader: Option<JoinHandle<()>>,
}

impl Link {
    /// Wraps a pair of channels.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outbound, inbound, reader: None }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Opens links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the physical connection. Returns once the link is open.
    async fn connect(&self, url: &str) -> Result<Link, FeedError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Link, FeedError> {
        let (ws_stream, _) = connect_async(url).await.map_err(|e| FeedError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let writer_events = event_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                log::trace!("Sending frame: {}", text);
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    let _ = writer_events.send(TransportEvent::Error(format!("send failed: {}", e)));
                    return;
                }
            }
            let _ = write.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Message(text.as_str().to_owned()),
                    Ok(Message::Close(frame)) => {
                        log::info!("WSS closed by remote host: {:?}", frame);
                        let _ = event_tx.send(TransportEvent::Closed);
                        return;
                    }
                    // Ping/pong are answered by tungstenite; the feed never sends binary.
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = event_tx.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                };
                if event_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = event_tx.send(TransportEvent::Closed);
        });

        Ok(Link {
            outbound: out_tx,
            inbound: event_rx,
            reader: Some(reader),
        })
    }
}
