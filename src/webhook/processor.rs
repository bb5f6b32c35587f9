//! Validator/processor collaborator
//!
//! The webhook core does not interpret payloads. It asks a [`MessageHandler`]
//! whether a payload is a recognized event and, if so, hands it over for
//! processing. Both calls happen inside a detached task, after the platform
//! has already been acknowledged.

use serde_json::Value;
use tracing::{debug, info};

use crate::webhook::events::{classify, is_valid_whatsapp_message, WhatsAppEnvelope};
use crate::webhook::payload::ParsedPayload;

/// Handler trait for inbound webhook payloads
///
/// Implementations are shared across concurrently running tasks.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Whether the payload is an event this handler processes.
    ///
    /// Receives [`ParsedPayload::Absent`] for bodies that did not parse.
    fn is_valid_message(&self, payload: &ParsedPayload) -> bool;

    /// Handle a recognized event
    async fn process_message(&self, payload: &Value) -> anyhow::Result<()>;
}

/// No-op handler: recognizes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHandler;

#[async_trait::async_trait]
impl MessageHandler for NoOpHandler {
    fn is_valid_message(&self, _payload: &ParsedPayload) -> bool {
        false
    }

    async fn process_message(&self, _payload: &Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Recognizes WhatsApp inbound messages and logs them
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatsAppLoggingHandler;

#[async_trait::async_trait]
impl MessageHandler for WhatsAppLoggingHandler {
    fn is_valid_message(&self, payload: &ParsedPayload) -> bool {
        let valid = is_valid_whatsapp_message(payload);
        if !valid {
            debug!(kind = classify(payload).as_str(), "Ignoring non-message webhook");
        }
        valid
    }

    async fn process_message(&self, payload: &Value) -> anyhow::Result<()> {
        let envelope = WhatsAppEnvelope::from_value(payload)?;
        let message = envelope
            .first_message()
            .ok_or_else(|| anyhow::anyhow!("envelope carries no message"))?;

        info!(
            message_id = %message.id,
            from = %message.from,
            sender_name = envelope.first_contact_name().unwrap_or("-"),
            message_type = %message.message_type,
            text_len = message.text.as_ref().map(|t| t.body.len()).unwrap_or(0),
            "WhatsApp message received"
        );
        Ok(())
    }
}
