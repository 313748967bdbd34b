//! # Fact Extractor
//!
//! Pure classification of decoded frames. `reward` frames are recognised but
//! left opaque; `fact` frames are searched for the campaign's running total.

use serde_json::{Map, Value};

use super::codec::{Frame, MalformedFrame};

/// Event name of a reward notification.
pub const REWARD_EVENT: &str = "reward";
/// Event name of an aggregate-state snapshot.
pub const FACT_EVENT: &str = "fact";
/// Payload field holding the running total on `fact` events.
pub const AMOUNT_FIELD: &str = "totalAmountRaised";

/// What an inbound frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A reward notification. Its payload is not inspected.
    Reward,
    /// An aggregate snapshot. `total_raised` is `None` when the payload has no
    /// usable amount field.
    Fact {
        /// Whole currency units, truncated toward zero.
        total_raised: Option<i64>,
    },
    /// Any other event, e.g. `phx_reply`.
    Other(String),
    /// The text did not decode as a frame.
    Malformed(MalformedFrame),
}

/// The kinds of facts this client extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    /// The campaign's running total.
    RaisedAmount,
}

/// A domain value pulled out of a qualifying frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedFact {
    /// What the value measures.
    pub kind: FactKind,
    /// The value itself.
    pub value: i64,
}

impl Classification {
    /// The fact destined for the amount log, if this frame produced one.
    pub fn extracted_fact(&self) -> Option<ExtractedFact> {
        match self {
            Classification::Fact { total_raised: Some(value) } => Some(ExtractedFact {
                kind: FactKind::RaisedAmount,
                value: *value,
            }),
            _ => None,
        }
    }
}

/// Classifies a decode result.
pub fn classify(decoded: &Result<Frame, MalformedFrame>) -> Classification {
    let frame = match decoded {
        Ok(frame) => frame,
        Err(malformed) => return Classification::Malformed(malformed.clone()),
    };

    match frame.event.as_str() {
        REWARD_EVENT => Classification::Reward,
        FACT_EVENT => Classification::Fact {
            total_raised: raised_amount(&frame.payload),
        },
        other => Classification::Other(other.to_string()),
    }
}

/// Looks up [`AMOUNT_FIELD`] and converts it to whole units.
///
/// Numbers are truncated toward zero. Strings go through
/// [`parse_leading_integer`]. Anything else, or a value that does not parse,
/// is a miss.
pub fn raised_amount(payload: &Map<String, Value>) -> Option<i64> {
    match payload.get(AMOUNT_FIELD)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate_f64)),
        Value::String(s) => parse_leading_integer(s),
        _ => None,
    }
}

fn truncate_f64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

fn is_currency_symbol(c: char) -> bool {
    matches!(c, '$' | '€' | '£' | '¥' | '₹')
}

/// Reads the leading integer of a currency-style string.
///
/// An optional sign and a single currency symbol may precede the digits in
/// either order. Commas between digits are thousands separators. Parsing stops
/// at the first other character, so the fractional part is dropped rather than
/// rounded: `"$1,234.56"` gives `1234`, `"-$12.9"` gives `-12`.
pub fn parse_leading_integer(text: &str) -> Option<i64> {
    let mut chars = text.trim().chars().peekable();
    let mut negative = false;
    let mut seen_sign = false;
    let mut seen_symbol = false;

    while let Some(&c) = chars.peek() {
        match c {
            '-' | '+' if !seen_sign => {
                negative = c == '-';
                seen_sign = true;
            }
            c if is_currency_symbol(c) && !seen_symbol => seen_symbol = true,
            _ => break,
        }
        chars.next();
    }

    let mut value: i64 = 0;
    let mut digits = 0usize;
    let mut after_digit = false;

    while let Some(&c) = chars.peek() {
        if let Some(d) = c.to_digit(10) {
            value = value.checked_mul(10)?.checked_add(i64::from(d))?;
            digits += 1;
            after_digit = true;
        } else if c == ',' && after_digit {
            after_digit = false;
        } else {
            break;
        }
        chars.next();
    }

    if digits == 0 {
        return None;
    }
    Some(if negative { -value } else { value })
}
