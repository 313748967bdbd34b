//! # Frame Codec
//!
//! Phoenix channels (serializer `vsn=2.0.0`) put every message on the wire as a
//! JSON array of exactly five positional elements:
//!
//! ```text
//! [joinRef, ref, topic, event, payload]
//! ```
//!
//! `joinRef` and `ref` are correlation strings or `null`, `topic` and `event`
//! are strings, and `payload` is a JSON object. Decoding never fails loudly:
//! anything that does not match this shape comes back as a [`MalformedFrame`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::error::FeedError;

/// Event name of a channel join request.
pub const JOIN_EVENT: &str = "phx_join";
/// Event name of a keep-alive frame.
pub const HEARTBEAT_EVENT: &str = "heartbeat";
/// Reserved topic every heartbeat is addressed to.
pub const HEARTBEAT_TOPIC: &str = "phoenix";
/// Correlation ids of the two join frames, in send order.
pub const JOIN_REFS: [&str; 2] = ["3", "6"];
/// Correlation id carried by every heartbeat.
pub const HEARTBEAT_REF: &str = "7";

/// A single protocol frame, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireFrame", into = "WireFrame")]
pub struct Frame {
    /// Correlation id of the join that opened the channel, if any.
    pub join_ref: Option<String>,
    /// Correlation id of this message, if any.
    pub reference: Option<String>,
    /// Channel topic, e.g. `fact.<event-id>.fact`.
    pub topic: String,
    /// Event discriminator, e.g. `fact`, `reward`, `phx_reply`.
    pub event: String,
    /// Event-specific fields.
    pub payload: Map<String, Value>,
}

/// Positional wire layout. Serde maps a tuple struct to a fixed-length JSON
/// array, which rejects both short and long arrays.
#[derive(Serialize, Deserialize)]
struct WireFrame(Option<String>, Option<String>, String, String, Map<String, Value>);

impl From<WireFrame> for Frame {
    fn from(WireFrame(join_ref, reference, topic, event, payload): WireFrame) -> Self {
        Self { join_ref, reference, topic, event, payload }
    }
}

impl From<Frame> for WireFrame {
    fn from(frame: Frame) -> Self {
        WireFrame(frame.join_ref, frame.reference, frame.topic, frame.event, frame.payload)
    }
}

/// An inbound message that could not be decoded as a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed frame ({reason}): {raw}")]
pub struct MalformedFrame {
    /// The text exactly as it arrived.
    pub raw: String,
    /// Why decoding failed.
    pub reason: String,
}

/// Builds the two join frames, one per topic, each with its own correlation id.
///
/// Topics are not validated beyond being non-empty.
pub fn encode_join(topic_a: &str, topic_b: &str) -> Result<[Frame; 2], FeedError> {
    let join = |reference: &str, topic: &str| -> Result<Frame, FeedError> {
        if topic.trim().is_empty() {
            return Err(FeedError::Codec("join topic must not be empty".to_string()));
        }
        Ok(Frame {
            join_ref: Some(reference.to_string()),
            reference: Some(reference.to_string()),
            topic: topic.to_string(),
            event: JOIN_EVENT.to_string(),
            payload: Map::new(),
        })
    };

    Ok([join(JOIN_REFS[0], topic_a)?, join(JOIN_REFS[1], topic_b)?])
}

/// Builds the keep-alive frame: `[null, "7", "phoenix", "heartbeat", {}]`.
pub fn encode_heartbeat() -> Frame {
    Frame {
        join_ref: None,
        reference: Some(HEARTBEAT_REF.to_string()),
        topic: HEARTBEAT_TOPIC.to_string(),
        event: HEARTBEAT_EVENT.to_string(),
        payload: Map::new(),
    }
}

/// Renders a frame as wire text.
pub fn serialize(frame: &Frame) -> Result<String, FeedError> {
    serde_json::to_string(frame).map_err(|e| FeedError::Codec(e.to_string()))
}

/// Parses wire text into a [`Frame`]. Any parse or shape error yields a
/// [`MalformedFrame`] carrying the original text.
pub fn decode(raw: &str) -> Result<Frame, MalformedFrame> {
    serde_json::from_str::<Frame>(raw).map_err(|e| MalformedFrame {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}
