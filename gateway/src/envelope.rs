//! Event envelope for VIRTA
//!
//! The envelope is what leaves the engine: one stream entry becomes one
//! envelope, handed to a [`DeliveryGateway`](crate::DeliveryGateway) and
//! discarded. The payload is the entry's flat field/value sequence, kept as
//! opaque `Bytes` - VIRTA never interprets it.

use crate::codec::StreamEntry;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

/// Event type attribute stamped on every envelope
pub const EVENT_TYPE: &str = "dev.virta.stream.entry";

/// Content type of the serialized payload
pub const CONTENT_TYPE: &str = "application/json";

/// The event envelope - one per stream entry
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use virta_gateway::{EventEnvelope, StreamEntry};
///
/// let entry = StreamEntry {
///     id: "1519073278252-0".to_string(),
///     fields: vec![Bytes::from("qty"), Bytes::from("5")],
/// };
/// let envelope = EventEnvelope::from_entry("redis://localhost:6379/orders", entry);
/// assert_eq!(envelope.id, "1519073278252-0");
/// assert!(envelope.time.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    /// Entry id, server-assigned ("<ms>-<seq>")
    pub id: String,

    /// Event type attribute
    pub event_type: String,

    /// Origin identifier: "<address>/<stream>"
    pub source: String,

    /// Event time, recovered from the entry id's millisecond prefix
    pub time: Option<DateTime<Utc>>,

    /// Content type of the serialized payload
    pub content_type: String,

    /// Flat field/value sequence, opaque bytes
    pub payload: Vec<Bytes>,
}

impl EventEnvelope {
    /// Build the envelope for a stream entry
    pub fn from_entry(source: impl Into<String>, entry: StreamEntry) -> Self {
        let time = entry_time(&entry.id);
        Self {
            id: entry.id,
            event_type: EVENT_TYPE.to_string(),
            source: source.into(),
            time,
            content_type: CONTENT_TYPE.to_string(),
            payload: entry.fields,
        }
    }

    /// Source attribute for a connection address and stream name
    pub fn source_for(address: &str, stream: &str) -> String {
        format!("{address}/{stream}")
    }

    /// Payload values encoded for the JSON wire body
    ///
    /// Field values are opaque bytes, so the body is a JSON array of
    /// base64-encoded strings; the sink decodes them back byte-for-byte.
    pub fn payload_base64(&self) -> Vec<String> {
        self.payload.iter().map(|v| BASE64.encode(v)).collect()
    }

    /// Total payload size in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.iter().map(|v| v.len()).sum()
    }
}

/// Recover the event time from an entry id's millisecond prefix
fn entry_time(id: &str) -> Option<DateTime<Utc>> {
    let (ms, _seq) = id.split_once('-')?;
    let ms: i64 = ms.parse().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}
