//! Stream reply codec
//!
//! Decodes the loosely-typed reply of a single-stream `XREADGROUP` into
//! structured entries. Pure and deterministic: the same reply always yields
//! the same entries or the same error classification.
//!
//! The engine reads one named stream with `COUNT 1`, so a well-formed reply
//! is one stream element carrying at most one entry:
//!
//! ```text
//! 1) 1) "mystream"
//!    2) 1) 1) 1519073278252-0
//!          2) 1) "qty"
//!             2) "5"
//! ```

use crate::error::DecodeError;
use bytes::Bytes;
use redis::Value;

/// One stream entry as read from the server
///
/// `fields` is the flat, ordered field/value sequence exactly as returned;
/// values are opaque bytes and are never re-typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Server-assigned entry id ("<ms-timestamp>-<seq>")
    pub id: String,

    /// Alternating field/value sequence, opaque bytes
    pub fields: Vec<Bytes>,
}

/// Decode a raw reply into stream entries
///
/// * `Value::Nil` (block timeout with no data) decodes to [`DecodeError::Empty`].
/// * A reply with more or fewer than one stream element is [`DecodeError::Shape`].
/// * A single stream element with zero entries is [`DecodeError::Empty`]
///   (end of the pending list).
/// * Any structural violation inside the element is [`DecodeError::Malformed`].
pub fn decode(reply: Value) -> Result<Vec<StreamEntry>, DecodeError> {
    let mut streams = match reply {
        Value::Nil => return Err(DecodeError::Empty),
        Value::Array(streams) => streams,
        other => {
            return Err(DecodeError::Malformed(format!(
                "reply is not an array of streams: {other:?}"
            )))
        }
    };

    if streams.len() != 1 {
        return Err(DecodeError::Shape(streams.len()));
    }

    let element = match streams.pop() {
        Some(Value::Array(element)) => element,
        other => {
            return Err(DecodeError::Malformed(format!(
                "stream element is not an array: {other:?}"
            )))
        }
    };

    if element.len() != 2 {
        return Err(DecodeError::Malformed(format!(
            "stream element has {} parts, expected name and entries",
            element.len()
        )));
    }

    let mut parts = element.into_iter();
    // The name slot must be a string, though the engine reads a single
    // stream and does not act on it.
    match parts.next() {
        Some(Value::BulkString(_)) | Some(Value::SimpleString(_)) => {}
        other => {
            return Err(DecodeError::Malformed(format!(
                "stream name is not a string: {other:?}"
            )))
        }
    }

    let items = match parts.next() {
        Some(Value::Array(items)) => items,
        other => {
            return Err(DecodeError::Malformed(format!(
                "stream entries are not an array: {other:?}"
            )))
        }
    };

    if items.is_empty() {
        return Err(DecodeError::Empty);
    }

    items.into_iter().map(decode_entry).collect()
}

/// Decode a raw reply that must carry exactly one entry
///
/// This is the worker-side contract for `COUNT 1` reads; a reply with more
/// than one entry is a [`DecodeError::Shape`].
pub fn decode_one(reply: Value) -> Result<StreamEntry, DecodeError> {
    let mut entries = decode(reply)?;
    if entries.len() != 1 {
        return Err(DecodeError::Shape(entries.len()));
    }
    // len checked above
    entries.pop().ok_or(DecodeError::Empty)
}

fn decode_entry(item: Value) -> Result<StreamEntry, DecodeError> {
    let entry = match item {
        Value::Array(entry) => entry,
        other => {
            return Err(DecodeError::Malformed(format!(
                "entry is not an array: {other:?}"
            )))
        }
    };

    if entry.len() != 2 {
        return Err(DecodeError::Malformed(format!(
            "entry has {} parts, expected id and fields",
            entry.len()
        )));
    }

    let mut parts = entry.into_iter();
    let id = match parts.next() {
        Some(Value::BulkString(bytes)) => String::from_utf8(bytes)
            .map_err(|e| DecodeError::Malformed(format!("entry id is not UTF-8: {e}")))?,
        Some(Value::SimpleString(s)) => s,
        other => {
            return Err(DecodeError::Malformed(format!(
                "entry id is not a string: {other:?}"
            )))
        }
    };

    let fields = match parts.next() {
        Some(Value::Array(fields)) => fields
            .into_iter()
            .map(|v| match v {
                Value::BulkString(bytes) => Ok(Bytes::from(bytes)),
                Value::SimpleString(s) => Ok(Bytes::from(s.into_bytes())),
                other => Err(DecodeError::Malformed(format!(
                    "field value is not a string: {other:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(DecodeError::Malformed(format!(
                "entry fields are not an array: {other:?}"
            )))
        }
    };

    Ok(StreamEntry { id, fields })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bulk(s: &[u8]) -> Value {
        Value::BulkString(s.to_vec())
    }

    fn entry_value(id: &str, fields: &[&[u8]]) -> Value {
        Value::Array(vec![
            bulk(id.as_bytes()),
            Value::Array(fields.iter().map(|f| bulk(f)).collect()),
        ])
    }

    fn reply(stream: &str, entries: Vec<Value>) -> Value {
        Value::Array(vec![Value::Array(vec![
            bulk(stream.as_bytes()),
            Value::Array(entries),
        ])])
    }

    #[test]
    fn test_decode_round_trip() {
        let raw = reply(
            "orders",
            vec![entry_value("1519073278252-0", &[b"qty", b"5"])],
        );

        let entries = decode(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "1519073278252-0");
        assert_eq!(entries[0].fields, vec![Bytes::from("qty"), Bytes::from("5")]);
    }

    #[test]
    fn test_decode_preserves_raw_bytes() {
        let raw = reply("s", vec![entry_value("1-0", &[b"blob", &[0xFF, 0x00, 0x80]])]);

        let entries = decode(raw).unwrap();
        assert_eq!(entries[0].fields[1], Bytes::from(vec![0xFF, 0x00, 0x80]));
    }

    #[test]
    fn test_nil_reply_is_empty() {
        assert_eq!(decode(Value::Nil), Err(DecodeError::Empty));
    }

    #[test]
    fn test_zero_items_is_empty() {
        let raw = reply("orders", vec![]);
        assert_eq!(decode(raw), Err(DecodeError::Empty));
    }

    #[test]
    fn test_zero_streams_is_shape_error() {
        assert_eq!(decode(Value::Array(vec![])), Err(DecodeError::Shape(0)));
    }

    #[test]
    fn test_two_streams_is_shape_error() {
        let raw = Value::Array(vec![
            Value::Array(vec![bulk(b"a"), Value::Array(vec![])]),
            Value::Array(vec![bulk(b"b"), Value::Array(vec![])]),
        ]);
        assert_eq!(decode(raw), Err(DecodeError::Shape(2)));
    }

    #[test]
    fn test_garbage_is_malformed_not_empty() {
        assert!(matches!(
            decode(Value::Int(7)),
            Err(DecodeError::Malformed(_))
        ));

        let missing_entries = Value::Array(vec![Value::Array(vec![bulk(b"orders")])]);
        assert!(matches!(
            decode(missing_entries),
            Err(DecodeError::Malformed(_))
        ));

        let bad_entry = reply("orders", vec![Value::Int(1)]);
        assert!(matches!(decode(bad_entry), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_one_rejects_multiple_entries() {
        let raw = reply(
            "orders",
            vec![
                entry_value("1-0", &[b"a", b"1"]),
                entry_value("2-0", &[b"b", b"2"]),
            ],
        );
        assert_eq!(decode_one(raw), Err(DecodeError::Shape(2)));
    }

    #[test]
    fn test_decode_one_single_entry() {
        let raw = reply("orders", vec![entry_value("7-1", &[b"k", b"v"])]);
        let entry = decode_one(raw).unwrap();
        assert_eq!(entry.id, "7-1");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let make = || reply("s", vec![entry_value("3-0", &[b"x"])]);
        assert_eq!(decode(make()).unwrap(), decode(make()).unwrap());
    }
}
