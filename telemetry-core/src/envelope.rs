//! Telemetry envelope encoding
//!
//! Every accepted event becomes one line:
//!
//! ```text
//! {"event":"<name>","ts_ms":<int>,"session_id":"<id>","payload":{...}}
//! ```
//!
//! The line is built by construction rather than by serializing a struct,
//! so field order is fixed and output is byte-for-byte reproducible. The
//! payload body is spliced in verbatim after an object-shape check; it is
//! not parsed. A payload such as `{"x":}` therefore still produces an
//! invalid line, which is a known limitation of the format.

use std::borrow::Cow;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope fields in output order
pub const ENVELOPE_FIELDS: [&str; 4] = ["event", "ts_ms", "session_id", "payload"];

/// Substituted for absent, blank or non-object payloads
pub const EMPTY_PAYLOAD: &str = "{}";

/// An event payload as supplied by a producer
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No payload; encodes as `{}`
    #[default]
    Absent,
    /// Raw JSON object text
    Json(String),
    /// Structured key/value map
    Fields(Map<String, Value>),
}

impl Payload {
    /// The payload body to splice into the envelope
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Payload::Absent => Cow::Borrowed(EMPTY_PAYLOAD),
            Payload::Json(text) => Cow::Borrowed(normalize_payload(Some(text))),
            Payload::Fields(map) => match serde_json::to_string(map) {
                Ok(text) => Cow::Owned(text),
                Err(_) => Cow::Borrowed(EMPTY_PAYLOAD),
            },
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Json(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Json(text)
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Payload::Fields(map)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Payload::Absent,
            Value::Object(map) => Payload::Fields(map),
            other => Payload::Json(other.to_string()),
        }
    }
}

impl<T: Into<Payload>> From<Option<T>> for Payload {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// A decoded envelope, as read back by analyzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub event: String,
    pub ts_ms: i64,
    pub session_id: String,
    pub payload: Map<String, Value>,
}

/// Apply the object-shape check to payload text
///
/// Returns the trimmed text when it starts with `{` and ends with `}`,
/// otherwise `{}`.
pub fn normalize_payload(text: Option<&str>) -> &str {
    match text.map(str::trim) {
        Some(t) if t.len() >= 2 && t.starts_with('{') && t.ends_with('}') => t,
        _ => EMPTY_PAYLOAD,
    }
}

/// Escape a string for a JSON string literal body
///
/// Escapes `\`, `"`, newline, carriage return and tab by name and every
/// other control character below 0x20 as `\u00XX`.
pub fn escape_json_string(input: &str) -> Cow<'_, str> {
    if !input.chars().any(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn needs_escape(c: char) -> bool {
    c == '\\' || c == '"' || (c as u32) < 0x20
}

/// Encode one envelope line, without the trailing newline
///
/// `event` is expected to be validated and trimmed already. The clock is
/// not read here; `now_ms` is supplied by the caller.
pub fn encode(event: &str, payload: Option<&str>, session_id: &str, now_ms: i64) -> String {
    let payload = normalize_payload(payload);
    let event = escape_json_string(event);
    let session_id = escape_json_string(session_id);

    let mut line =
        String::with_capacity(event.len() + session_id.len() + payload.len() + 56);
    line.push_str("{\"event\":\"");
    line.push_str(&event);
    line.push_str("\",\"ts_ms\":");
    let _ = write!(line, "{}", now_ms);
    line.push_str(",\"session_id\":\"");
    line.push_str(&session_id);
    line.push_str("\",\"payload\":");
    line.push_str(payload);
    line.push('}');
    line
}

/// Encode with a structured [`Payload`]
pub fn encode_payload(event: &str, payload: &Payload, session_id: &str, now_ms: i64) -> String {
    encode(event, Some(&payload.to_text()), session_id, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_line() {
        let line = encode("A", Some(r#"{"x":1}"#), "s1", 1_700_000_000_000);
        assert_eq!(
            line,
            r#"{"event":"A","ts_ms":1700000000000,"session_id":"s1","payload":{"x":1}}"#
        );
    }

    #[test]
    fn test_payload_fallbacks() {
        for bad in [None, Some(""), Some("   "), Some("not-json"), Some("[1,2]"), Some("{"), Some("}"), Some("\"{}\"")] {
            let line = encode("A", bad, "s", 0);
            assert!(line.ends_with(r#""payload":{}}"#), "{:?} -> {}", bad, line);
        }
    }

    #[test]
    fn test_payload_is_trimmed() {
        let line = encode("A", Some("  {\"k\":\"v\"}\n"), "s", 5);
        assert!(line.ends_with(r#""payload":{"k":"v"}}"#));
    }

    #[test]
    fn test_object_shaped_payload_is_not_parsed() {
        let line = encode("A", Some("{oops}"), "s", 5);
        assert!(line.ends_with(r#""payload":{oops}}"#));
        assert!(serde_json::from_str::<Value>(&line).is_err());
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_json_string("plain"), "plain");
        assert_eq!(escape_json_string(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_json_string("l1\nl2\r\t"), "l1\\nl2\\r\\t");
        assert_eq!(escape_json_string("\u{0001}\u{001f}"), "\\u0001\\u001f");
        assert_eq!(escape_json_string("ψ/é"), "ψ/é");
    }

    #[test]
    fn test_escaped_fields_round_trip() {
        let line = encode("we\"ird\nname", None, "sess\\\u{0002}", 42);
        let parsed: TelemetryEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.event, "we\"ird\nname");
        assert_eq!(parsed.session_id, "sess\\\u{0002}");
        assert_eq!(parsed.ts_ms, 42);
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn test_exactly_four_keys_in_order() {
        let line = encode("A", Some(r#"{"nested":{"a":[1,2]}}"#), "s", 7);
        let value: Value = serde_json::from_str(&line).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        for field in ENVELOPE_FIELDS {
            assert!(obj.contains_key(field));
        }
        let positions: Vec<usize> = ENVELOPE_FIELDS
            .iter()
            .map(|f| line.find(&format!("\"{}\":", f)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let reserialized: Value = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
        assert_eq!(reserialized, value);
    }

    #[test]
    fn test_structured_payloads() {
        let map = json!({"gain": 0.5, "state": "STABLE"});
        let payload = Payload::from(map.clone());
        let line = encode_payload("W", &payload, "s", 1);
        let parsed: TelemetryEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(Value::Object(parsed.payload), map);

        assert_eq!(Payload::from(Value::Null).to_text(), "{}");
        assert_eq!(Payload::from(json!([1])).to_text(), "{}");
        assert_eq!(Payload::from(None::<&str>).to_text(), "{}");
        assert_eq!(Payload::from(Some(" {\"a\":1} ")).to_text(), "{\"a\":1}");
    }
}
