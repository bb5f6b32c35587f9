//! WhatsApp Cloud API Webhook Module
//!
//! Receives event notifications pushed by the messaging platform:
//!
//! - **Verification**: the `GET` subscribe/verify handshake
//! - **Ack-first intake**: every `POST` is answered `200 EVENT_RECEIVED`
//!   before its payload is interpreted
//! - **Detached processing**: validation and processing run in a task the
//!   request never waits on
//!
//! # Architecture
//!
//! ```text
//! GET  -> VerificationHandler -> 200 challenge | 403
//! POST -> IntakeHandler -> capture -> parse -> Ack (200)
//!                                               |
//!                                               v
//!                                  TaskDispatcher -> MessageHandler
//!                                  (detached)        validate, process
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whatsapp_webhook::config::WebhookConfig;
//! use whatsapp_webhook::webhook::{webhook_router, WebhookState, WhatsAppLoggingHandler};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WebhookConfig::from_env()?;
//! let state = WebhookState::new(&config, Arc::new(WhatsAppLoggingHandler));
//! let app = webhook_router(Arc::new(state));
//! // ... serve with axum
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod intake;
pub mod observer;
pub mod payload;
pub mod processor;
pub mod verification;

// Re-export commonly used items
pub use dispatcher::{
    ProcessingTask, SpawnRejected, Submission, TaskDispatcher, TaskFuture, TaskOutcome,
    TaskSpawner, TokioSpawner,
};
pub use events::{is_valid_whatsapp_message, EventKind, WhatsAppEnvelope};
pub use handler::{head_webhook, receive_webhook, verify_webhook, webhook_router, WebhookState};
pub use intake::{IntakeHandler, ACK_BODY};
pub use observer::{
    CountingObserver, Observation, RecordingObserver, TracingObserver, WebhookObserver,
};
pub use payload::{InboundEvent, ParsedPayload, BODY_PREVIEW_BYTES};
pub use processor::{MessageHandler, NoOpHandler, WhatsAppLoggingHandler};
pub use verification::{
    VerificationAttempt, VerificationFailure, VerificationHandler, VerificationOutcome,
    VERIFICATION_FAILED_BODY,
};
