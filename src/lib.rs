//! WhatsApp Webhook - Ack-first receiver for WhatsApp Cloud API notifications
//!
//! This crate receives event notifications pushed by the WhatsApp Cloud API,
//! completes the platform's subscription-verification handshake, and
//! acknowledges every delivery immediately while payload processing runs in a
//! detached task.
//!
//! # Features
//!
//! - **Verification**: `GET /webhook` handshake against an injected secret
//! - **Ack-first intake**: `POST /webhook` always answers `200 EVENT_RECEIVED`
//! - **Detached processing**: pluggable [`webhook::MessageHandler`] run off
//!   the request path, with inline fallback when spawning fails
//! - **Observability**: structured observations, `/health` and `/status`
//!
//! # Architecture
//!
//! ```text
//! WhatsApp Cloud API ──▶ axum Router ──▶ VerificationHandler (GET)
//!                            │
//!                            ▼
//!                      IntakeHandler (POST) ──▶ 200 EVENT_RECEIVED
//!                            │
//!                            ▼
//!                      TaskDispatcher ──▶ MessageHandler
//!                      (tokio::spawn)      validate + process
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whatsapp_webhook::{serve, WebhookConfig, WhatsAppLoggingHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WebhookConfig::from_env()?;
//!     serve(config, Arc::new(WhatsAppLoggingHandler)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod webhook;

// Re-exports for convenience
pub use config::{VerifyToken, WebhookConfig};
pub use error::{ConfigError, DispatchError, Error, Result};
pub use server::{app, serve};
pub use webhook::{MessageHandler, ParsedPayload, WebhookState, WhatsAppLoggingHandler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
