//! Inbound frames (gateway to client), parsed leniently.
//!
//! The session only validates what it needs for its own bookkeeping: the
//! `action` discriminator, a top-level numeric `room_id`, and the nested
//! `message` payload for echo detection. Everything else passes through to
//! the consumer untouched, so an [`InboundFrame`] keeps the raw
//! [`serde_json::Value`] rather than deserializing into a closed enum.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    MessageId, RoomId, UserId,
    errors::{ProtocolError, Result},
};

/// A frame received from the gateway.
///
/// # Invariants
///
/// - Always a JSON object ([`InboundFrame::parse`] rejects anything else).
/// - The raw value is never mutated; accessors are read-only views.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    raw: Value,
}

/// Nested `message` payload of a `message`-action frame.
///
/// Every field is optional: the gateway populates what it has and the client
/// must not reject partially-populated payloads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MessageBody {
    /// Gateway-assigned message id, when known.
    #[serde(default)]
    pub id: Option<MessageId>,

    /// Message content.
    #[serde(default)]
    pub content: Option<String>,

    /// Stable id of the message author.
    #[serde(default)]
    pub sender_id: Option<UserId>,

    /// Gateway timestamp, format unspecified (kept as raw JSON).
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl InboundFrame {
    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedFrame`] if the text is not valid JSON
    /// - [`ProtocolError::NotAnObject`] if it parses to a non-object
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedFrame { reason: e.to_string() })?;

        if !raw.is_object() {
            return Err(ProtocolError::NotAnObject);
        }

        Ok(Self { raw })
    }

    /// Wrap an already-parsed JSON object.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::NotAnObject`] if the value is not an object
    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(Self { raw })
    }

    /// The `action` discriminator, if present and a string.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.raw.get("action").and_then(Value::as_str)
    }

    /// Top-level numeric `room_id`, if present.
    ///
    /// Any frame kind may carry one; the session adopts it as the current
    /// room binding (last writer wins).
    #[must_use]
    pub fn room_id(&self) -> Option<RoomId> {
        self.raw.get("room_id").and_then(Value::as_u64)
    }

    /// The nested `message` payload, if present and well-formed enough to
    /// deserialize. A malformed payload yields `None` rather than an error;
    /// the frame is still forwarded as-is.
    #[must_use]
    pub fn message(&self) -> Option<MessageBody> {
        let message = self.raw.get("message")?;
        serde_json::from_value(message.clone()).ok()
    }

    /// Read-only view of the raw frame.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    /// Consume the frame, yielding the raw JSON for the consumer.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_rejects_non_json() {
        let result = InboundFrame::parse("not json at all");
        assert!(matches!(result, Err(ProtocolError::MalformedFrame { .. })));
    }

    #[test]
    fn parse_rejects_non_object() {
        assert_eq!(InboundFrame::parse("[1,2,3]"), Err(ProtocolError::NotAnObject));
        assert_eq!(InboundFrame::parse("\"hello\""), Err(ProtocolError::NotAnObject));
        assert_eq!(InboundFrame::parse("42"), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn room_binding_frame() {
        let frame = InboundFrame::parse(r#"{"room_id": 99}"#).unwrap();

        assert_eq!(frame.room_id(), Some(99));
        assert_eq!(frame.action(), None);
        assert!(frame.message().is_none());
    }

    #[test]
    fn message_frame_with_full_payload() {
        let frame = InboundFrame::parse(
            r#"{"action":"message","room_id":99,
               "message":{"id":5,"content":"hi","sender_id":7,"timestamp":1700000000}}"#,
        )
        .unwrap();

        assert_eq!(frame.action(), Some("message"));
        assert_eq!(frame.room_id(), Some(99));

        let body = frame.message().unwrap();
        assert_eq!(body.id, Some(5));
        assert_eq!(body.content.as_deref(), Some("hi"));
        assert_eq!(body.sender_id, Some(7));
        assert_eq!(body.timestamp, Some(json!(1_700_000_000)));
    }

    #[test]
    fn partially_populated_message_is_fine() {
        let frame =
            InboundFrame::parse(r#"{"action":"message","message":{"content":"hi"}}"#).unwrap();

        let body = frame.message().unwrap();
        assert_eq!(body.content.as_deref(), Some("hi"));
        assert_eq!(body.sender_id, None);
        assert_eq!(body.id, None);
    }

    #[test]
    fn unknown_action_passes_through_untouched() {
        let text = r#"{"action":"presence","users":[1,2,3],"extra":{"a":true}}"#;
        let frame = InboundFrame::parse(text).unwrap();

        assert_eq!(frame.action(), Some("presence"));
        assert_eq!(frame.into_value(), serde_json::from_str::<Value>(text).unwrap());
    }

    #[test]
    fn non_numeric_room_id_is_ignored() {
        let frame = InboundFrame::parse(r#"{"room_id": "ninety-nine"}"#).unwrap();
        assert_eq!(frame.room_id(), None);
    }

    #[test]
    fn garbage_message_payload_yields_none() {
        // `message` is a string, not an object; the frame itself stays valid.
        let frame = InboundFrame::parse(r#"{"action":"message","message":"oops"}"#).unwrap();
        assert!(frame.message().is_none());
    }
}
