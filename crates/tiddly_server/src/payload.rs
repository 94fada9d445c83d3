//! Splitting tiddler payloads into metadata and body, and joining them back.
//!
//! Clients send and receive a tiddler as one JSON object whose `"text"` field
//! holds the body. Storage keeps the body apart from the rest of the fields
//! so that the bulk listing can ship metadata only.

use serde_json::{Map, Value};

/// The payload field holding the body.
pub const TEXT_FIELD: &str = "text";

/// A JSON object of tiddler fields.
pub type Fields = Map<String, Value>;

/// A payload with the body removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPayload {
    /// Every field except the body.
    pub meta: Fields,
    /// The body, empty when absent or not a string.
    pub text: String,
}

/// Parses raw bytes as a JSON object.
pub fn parse_fields(data: &[u8]) -> serde_json::Result<Fields> {
    serde_json::from_slice(data)
}

/// Removes the body from `fields`.
///
/// A `"text"` value that is not a string is dropped and the body is empty.
pub fn split_payload(mut fields: Fields) -> SplitPayload {
    let text = match fields.remove(TEXT_FIELD) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    };
    SplitPayload { meta: fields, text }
}

/// Parses stored metadata and puts the body back in.
///
/// Fails if `meta` is not a JSON object; this includes the empty metadata of
/// a tombstone.
pub fn join_payload(meta: &str, text: &str) -> serde_json::Result<Fields> {
    let mut fields: Fields = serde_json::from_str(meta)?;
    fields.insert(TEXT_FIELD.to_string(), Value::String(text.to_string()));
    Ok(fields)
}
