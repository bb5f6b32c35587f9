//! WhatsApp Cloud API event types
//!
//! Strongly-typed representations of the notification envelope the platform
//! posts to the webhook, plus the stock recognizer for inbound messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::webhook::payload::ParsedPayload;

/// Kind of notification carried by an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// At least one inbound user message
    Message,
    /// Delivery/read receipts for outbound messages
    StatusUpdate,
    /// Anything else (account updates, unknown fields, non-envelopes)
    Other,
}

impl EventKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::StatusUpdate => "status_update",
            Self::Other => "other",
        }
    }
}

/// Top-level notification envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppEnvelope {
    /// Always `whatsapp_business_account` for this product
    #[serde(default)]
    pub object: String,

    /// One entry per business account
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// Per-account entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    /// WhatsApp Business Account id
    #[serde(default)]
    pub id: String,

    /// Changed fields
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// A single field change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    /// Subscribed field name, `messages` for message traffic
    #[serde(default)]
    pub field: String,

    /// Change payload
    #[serde(default)]
    pub value: ChangeValue,
}

/// Payload of a `messages` change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    /// Always `whatsapp`
    #[serde(default)]
    pub messaging_product: Option<String>,

    /// Receiving business phone number
    #[serde(default)]
    pub metadata: Option<PhoneMetadata>,

    /// Senders' profiles
    #[serde(default)]
    pub contacts: Vec<Contact>,

    /// Inbound messages
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Delivery status updates
    #[serde(default)]
    pub statuses: Vec<StatusUpdate>,
}

/// Business phone number the event was delivered to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhoneMetadata {
    /// Human-readable number
    #[serde(default)]
    pub display_phone_number: String,
    /// Graph API phone number id
    #[serde(default)]
    pub phone_number_id: String,
}

/// Sender profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    /// WhatsApp id of the sender
    #[serde(default)]
    pub wa_id: String,
    /// Profile block
    #[serde(default)]
    pub profile: Option<Profile>,
}

/// Sender display profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Inbound message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender WhatsApp id
    #[serde(default)]
    pub from: String,

    /// Message id (`wamid.*`)
    #[serde(default)]
    pub id: String,

    /// Unix timestamp, as a string
    #[serde(default)]
    pub timestamp: String,

    /// Message type (`text`, `image`, `interactive`, ...)
    #[serde(rename = "type", default)]
    pub message_type: String,

    /// Present for `text` messages
    #[serde(default)]
    pub text: Option<TextBody>,
}

/// Text message body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextBody {
    /// Message text
    #[serde(default)]
    pub body: String,
}

/// Delivery status of an outbound message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Outbound message id
    #[serde(default)]
    pub id: String,
    /// `sent`, `delivered`, `read`, `failed`
    #[serde(default)]
    pub status: String,
    /// Unix timestamp, as a string
    #[serde(default)]
    pub timestamp: String,
    /// Recipient WhatsApp id
    #[serde(default)]
    pub recipient_id: String,
}

impl WhatsAppEnvelope {
    /// Deserialize from a parsed JSON value
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Iterate over every change value in every entry
    pub fn values(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .map(|c| &c.value)
    }

    /// First inbound message, if any
    pub fn first_message(&self) -> Option<&Message> {
        self.values().flat_map(|v| v.messages.iter()).next()
    }

    /// Display name of the first contact, if any
    pub fn first_contact_name(&self) -> Option<&str> {
        self.values()
            .flat_map(|v| v.contacts.iter())
            .filter_map(|c| c.profile.as_ref())
            .map(|p| p.name.as_str())
            .next()
    }
}

/// Whether a payload is an inbound-message notification.
///
/// A payload qualifies when it carries a non-empty `object` and the path
/// `entry[0].changes[0].value.messages[0]` exists and is non-empty.
/// [`ParsedPayload::Absent`] never qualifies.
pub fn is_valid_whatsapp_message(payload: &ParsedPayload) -> bool {
    let Some(body) = payload.as_value() else {
        return false;
    };

    is_truthy(body.get("object")) && is_truthy(body.pointer("/entry/0/changes/0/value/messages/0"))
}

/// Classify a payload without deserializing it fully
pub fn classify(payload: &ParsedPayload) -> EventKind {
    if is_valid_whatsapp_message(payload) {
        return EventKind::Message;
    }
    match payload.as_value() {
        Some(body) if is_truthy(body.pointer("/entry/0/changes/0/value/statuses/0")) => {
            EventKind::StatusUpdate
        }
        _ => EventKind::Other,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
    }
}
