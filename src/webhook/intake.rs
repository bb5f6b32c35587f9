//! Ack-first intake of event notifications
//!
//! Every POST that reaches the handler is answered `200 EVENT_RECEIVED`.
//! The body is captured, parsed leniently, and handed to the
//! [`TaskDispatcher`]; the response never waits on processing except in the
//! degraded inline-fallback path.
//!
//! ```text
//! POST -> capture headers/body -> parse (or Absent) -> ack -> submit task
//!              |                                                  |
//!       capture failure                                  detached / inline
//!       logged, body empty
//! ```

use std::sync::Arc;

use axum::body::{Body, Bytes};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};

use crate::webhook::dispatcher::TaskDispatcher;
use crate::webhook::observer::{Observation, WebhookObserver};
use crate::webhook::payload::{InboundEvent, BODY_PREVIEW_BYTES};

/// Fixed acknowledgement body
pub const ACK_BODY: &str = "EVENT_RECEIVED";

/// The acknowledgement returned for every POST
pub fn acknowledgement() -> (StatusCode, &'static str) {
    (StatusCode::OK, ACK_BODY)
}

/// Services the POST side of the webhook
pub struct IntakeHandler {
    dispatcher: TaskDispatcher,
    observer: Arc<dyn WebhookObserver>,
    max_body_bytes: usize,
}

impl IntakeHandler {
    /// Create an intake handler
    pub fn new(
        dispatcher: TaskDispatcher,
        observer: Arc<dyn WebhookObserver>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            observer,
            max_body_bytes,
        }
    }

    /// Acknowledge one delivery and hand its payload off for processing
    pub async fn handle(&self, headers: &HeaderMap, body: Body) -> (StatusCode, &'static str) {
        let event = self.capture(headers, body).await;
        let payload = event.payload();

        let ack = acknowledgement();
        self.dispatcher.submit(payload).await;
        ack
    }

    /// Capture headers and body for diagnostics.
    ///
    /// Never fails: headers that are not valid text are skipped, and an
    /// unreadable or oversized body is replaced by an empty one.
    pub async fn capture(&self, headers: &HeaderMap, body: Body) -> InboundEvent {
        let captured_headers = self.capture_headers(headers);

        let raw_body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.observer.observe(&Observation::CaptureFailed {
                    error: format!("body: {e}"),
                });
                Bytes::new()
            }
        };

        let event = InboundEvent::new(captured_headers, raw_body);
        self.observer.observe(&Observation::EventReceived {
            content_type: event.header(CONTENT_TYPE.as_str()).map(str::to_string),
            header_count: event.headers.len(),
            body_bytes: event.raw_body.len(),
            body_preview: event.body_preview(BODY_PREVIEW_BYTES),
        });
        event
    }

    fn capture_headers(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        let mut captured = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            match value.to_str() {
                Ok(text) => captured.push((name.as_str().to_string(), text.to_string())),
                Err(e) => self.observer.observe(&Observation::CaptureFailed {
                    error: format!("header {name}: {e}"),
                }),
            }
        }
        captured
    }
}
