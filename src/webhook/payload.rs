//! Inbound event capture and lenient payload parsing
//!
//! A POST body is parsed into a [`ParsedPayload`]. Parsing never fails: any
//! body that is not a JSON document becomes [`ParsedPayload::Absent`], which
//! downstream validation treats as "not a recognized event".

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Leading body bytes kept for diagnostics
pub const BODY_PREVIEW_BYTES: usize = 1024;

/// Result of leniently parsing a webhook body
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    /// The body was a JSON document
    Parsed(Value),
    /// The body was empty, malformed, or JSON `null`
    Absent,
}

impl ParsedPayload {
    /// Parse raw bytes, mapping every failure to [`ParsedPayload::Absent`]
    pub fn parse(raw: &[u8]) -> Self {
        serde_json::from_slice::<Value>(raw).ok().into()
    }

    /// Borrow the parsed value, if any
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Absent => None,
        }
    }

    /// Whether parsing produced no value
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Compact JSON rendering for log context (`"none"` when absent)
    pub fn describe(&self) -> String {
        match self {
            Self::Parsed(value) => value.to_string(),
            Self::Absent => "none".to_string(),
        }
    }
}

impl From<Option<Value>> for ParsedPayload {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(Value::Null) | None => Self::Absent,
            Some(value) => Self::Parsed(value),
        }
    }
}

/// One POST delivery as captured for diagnostics
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// When the request reached the intake handler
    pub received_at: DateTime<Utc>,
    /// Header name/value pairs that could be rendered as text
    pub headers: Vec<(String, String)>,
    /// The body exactly as received (empty if capture failed)
    pub raw_body: Bytes,
}

impl InboundEvent {
    /// Create an event stamped with the current time
    pub fn new(headers: Vec<(String, String)>, raw_body: Bytes) -> Self {
        Self {
            received_at: Utc::now(),
            headers,
            raw_body,
        }
    }

    /// Value of the first header with the given (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// At most `limit` leading body bytes as text, replacing invalid UTF-8
    pub fn body_preview(&self, limit: usize) -> String {
        let end = self.raw_body.len().min(limit);
        String::from_utf8_lossy(&self.raw_body[..end]).into_owned()
    }

    /// Leniently parse the captured body
    pub fn payload(&self) -> ParsedPayload {
        ParsedPayload::parse(&self.raw_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_json() {
        let payload = ParsedPayload::parse(br#"{"object":"whatsapp_business_account"}"#);
        assert_eq!(
            payload,
            ParsedPayload::Parsed(json!({"object": "whatsapp_business_account"}))
        );
    }

    #[test]
    fn test_parse_failures_are_absent() {
        assert!(ParsedPayload::parse(b"").is_absent());
        assert!(ParsedPayload::parse(b"not json").is_absent());
        assert!(ParsedPayload::parse(b"{\"truncated\":").is_absent());
        assert!(ParsedPayload::parse(&[0xff, 0xfe, 0x00]).is_absent());
    }

    #[test]
    fn test_null_is_absent() {
        assert!(ParsedPayload::parse(b"null").is_absent());
        assert!(ParsedPayload::from(Some(Value::Null)).is_absent());
    }

    #[test]
    fn test_scalar_json_is_parsed() {
        assert_eq!(ParsedPayload::parse(b"42"), ParsedPayload::Parsed(json!(42)));
    }

    #[test]
    fn test_describe() {
        assert_eq!(ParsedPayload::Absent.describe(), "none");
        assert_eq!(ParsedPayload::Parsed(json!({"a": 1})).describe(), r#"{"a":1}"#);
    }

    #[test]
    fn test_inbound_event_header_lookup() {
        let event = InboundEvent::new(
            vec![("content-type".to_string(), "application/json".to_string())],
            Bytes::from_static(b"{}"),
        );
        assert_eq!(event.header("Content-Type"), Some("application/json"));
        assert_eq!(event.header("x-missing"), None);
        assert_eq!(event.payload(), ParsedPayload::Parsed(json!({})));
    }

    #[test]
    fn test_body_preview_is_lossy() {
        let event = InboundEvent::new(Vec::new(), Bytes::from_static(&[b'o', b'k', 0xff]));
        assert!(event.body_preview(BODY_PREVIEW_BYTES).starts_with("ok"));
    }

    #[test]
    fn test_body_preview_is_bounded() {
        let event = InboundEvent::new(Vec::new(), Bytes::from(vec![b'a'; 4096]));
        assert_eq!(event.body_preview(BODY_PREVIEW_BYTES).len(), BODY_PREVIEW_BYTES);
        assert_eq!(event.body_preview(8), "aaaaaaaa");
        assert_eq!(event.raw_body.len(), 4096);
    }
}
