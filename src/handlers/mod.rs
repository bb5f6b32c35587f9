//! HTTP handlers outside the webhook itself.

pub mod status;

pub use status::{health_handler, status_handler, status_router, WebhookStats};
