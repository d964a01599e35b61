//! Common types: result aliases, event envelopes, and messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The error type used throughout the bot.
pub type Err = anyhow::Error;
/// Result with the bot's error type.
pub type Res<T> = Result<T, Err>;
/// Result without a value.
pub type Void = Res<()>;

/// An event delivered over the long connection.
///
/// The platform wraps every event in a schema-2.0 body: a `header` carrying the
/// event type, and an `event` object whose shape depends on that type.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Event type string, e.g. `im.message.receive_v1`.
    pub event_type: String,
    /// Platform-assigned event id, when present.
    pub event_id: Option<String>,
    /// The type-specific `event` object.
    pub event: Value,
}

#[derive(Deserialize)]
struct RawEnvelope {
    header: RawEnvelopeHeader,
    #[serde(default)]
    event: Value,
}

#[derive(Deserialize)]
struct RawEnvelopeHeader {
    event_type: String,
    #[serde(default)]
    event_id: Option<String>,
}

impl EventEnvelope {
    /// Creates an envelope without an event id.
    pub fn new(event_type: impl Into<String>, event: Value) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: None,
            event,
        }
    }

    /// Parses a schema-2.0 event body.
    pub fn from_slice(body: &[u8]) -> Res<Self> {
        let raw: RawEnvelope = serde_json::from_slice(body)?;

        Ok(Self {
            event_type: raw.header.event_type,
            event_id: raw.header.event_id,
            event: raw.event,
        })
    }
}

/// The `event` object of an `im.message.receive_v1` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageReceiveEvent {
    /// The received message.
    pub message: InboundMessage,
    /// Sender details, kept as raw JSON.
    #[serde(default)]
    pub sender: Option<Value>,
}

/// A chat message received by the bot.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Message id; replies are posted into its thread.
    #[serde(default)]
    pub message_id: String,
    /// Chat the message was sent in.
    #[serde(default)]
    pub chat_id: String,
    /// `p2p` or `group`.
    #[serde(default)]
    pub chat_type: String,
    /// `text`, `image`, `file`, ...
    #[serde(default)]
    pub message_type: String,
    /// JSON-encoded content; `{"text": "..."}` for plain text.
    #[serde(default)]
    pub content: String,
    /// Root message of the thread, if any.
    #[serde(default)]
    pub root_id: Option<String>,
    /// Message this one replies to, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A reply to be posted into the thread of `message_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    /// Message to reply to.
    pub message_id: String,
    /// Plain reply text.
    pub text: String,
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_from_slice() {
        let body = json!({
            "schema": "2.0",
            "header": { "event_id": "ev_1", "event_type": "im.message.receive_v1", "app_id": "cli_test" },
            "event": { "message": { "message_id": "om_1" } },
        });

        let envelope = EventEnvelope::from_slice(body.to_string().as_bytes()).unwrap();

        assert_eq!(envelope.event_type, "im.message.receive_v1");
        assert_eq!(envelope.event_id.as_deref(), Some("ev_1"));
        assert_eq!(envelope.event["message"]["message_id"], "om_1");
    }

    #[test]
    fn test_envelope_without_header_is_an_error() {
        assert!(EventEnvelope::from_slice(br#"{"event": {}}"#).is_err());
        assert!(EventEnvelope::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_inbound_message_defaults_missing_fields() {
        let event: MessageReceiveEvent = serde_json::from_value(json!({ "message": { "content": "{}" } })).unwrap();

        assert_eq!(event.message.message_id, "");
        assert_eq!(event.message.content, "{}");
        assert!(event.sender.is_none());
    }
}
