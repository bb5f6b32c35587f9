//! Axum handlers and router for the webhook endpoint
//!
//! # Routes
//! - `GET /webhook`, `GET /webhook/` - verification handshake
//! - `HEAD /webhook`, `HEAD /webhook/` - same status as GET, not counted
//! - `POST /webhook`, `POST /webhook/` - event intake, always `200 EVENT_RECEIVED`

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use http::{HeaderMap, StatusCode};
use tracing::instrument;

use crate::config::WebhookConfig;
use crate::handlers::status::WebhookStats;
use crate::webhook::dispatcher::{TaskDispatcher, TaskSpawner};
use crate::webhook::intake::IntakeHandler;
use crate::webhook::observer::{CountingObserver, TracingObserver, WebhookObserver};
use crate::webhook::processor::MessageHandler;
use crate::webhook::verification::{VerificationAttempt, VerificationHandler};

/// Shared state behind the webhook routes
pub struct WebhookState {
    verification: VerificationHandler,
    intake: IntakeHandler,
    stats: Arc<WebhookStats>,
}

impl WebhookState {
    /// State with the default tracing observer and tokio spawner
    pub fn new(config: &WebhookConfig, handler: Arc<dyn MessageHandler>) -> Self {
        Self::builder(config, handler).build()
    }

    /// Start building state with custom observer/spawner
    pub fn builder(config: &WebhookConfig, handler: Arc<dyn MessageHandler>) -> WebhookStateBuilder {
        WebhookStateBuilder {
            config: config.clone(),
            handler,
            observer: Arc::new(TracingObserver),
            spawner: None,
            stats: Arc::new(WebhookStats::new()),
        }
    }

    /// Counters shared with the status endpoint
    pub fn stats(&self) -> Arc<WebhookStats> {
        self.stats.clone()
    }
}

/// Builder for [`WebhookState`]
pub struct WebhookStateBuilder {
    config: WebhookConfig,
    handler: Arc<dyn MessageHandler>,
    observer: Arc<dyn WebhookObserver>,
    spawner: Option<Arc<dyn TaskSpawner>>,
    stats: Arc<WebhookStats>,
}

impl WebhookStateBuilder {
    /// Send observations to `observer` (counters are still updated)
    pub fn observer(mut self, observer: Arc<dyn WebhookObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Launch processing tasks through `spawner`
    pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Share existing counters
    pub fn stats(mut self, stats: Arc<WebhookStats>) -> Self {
        self.stats = stats;
        self
    }

    /// Assemble the state
    pub fn build(self) -> WebhookState {
        let observer: Arc<dyn WebhookObserver> =
            Arc::new(CountingObserver::new(self.stats.clone(), self.observer));

        let mut dispatcher = TaskDispatcher::new(self.handler, observer.clone());
        if let Some(spawner) = self.spawner {
            dispatcher = dispatcher.with_spawner(spawner);
        }

        WebhookState {
            verification: VerificationHandler::new(
                self.config.verify_token.clone(),
                observer.clone(),
            ),
            intake: IntakeHandler::new(dispatcher, observer, self.config.max_body_bytes),
            stats: self.stats,
        }
    }
}

/// Verification handshake handler.
///
/// # Route
/// `GET /webhook`
///
/// # Response
/// - `200 OK` with the challenge when mode and token match
/// - `403 Forbidden` with "Verification token mismatch" otherwise
#[instrument(skip_all)]
pub async fn verify_webhook(
    State(state): State<Arc<WebhookState>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let attempt = VerificationAttempt::from_query(query.as_deref());
    state.verification.handle(attempt)
}

/// Answers HEAD with the handshake status, without observing it
#[instrument(skip_all)]
pub async fn head_webhook(
    State(state): State<Arc<WebhookState>>,
    RawQuery(query): RawQuery,
) -> StatusCode {
    let attempt = VerificationAttempt::from_query(query.as_deref());
    state.verification.peek(attempt)
}

/// Event intake handler.
///
/// # Route
/// `POST /webhook`
///
/// # Response
/// - `200 OK` with `EVENT_RECEIVED`, always
#[instrument(skip_all)]
pub async fn receive_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let started = Instant::now();
    let response = state.intake.handle(&headers, body).await;
    state.stats.record_ack_latency(started.elapsed());
    response
}

/// Create the webhook router
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/webhook",
            get(verify_webhook).head(head_webhook).post(receive_webhook),
        )
        .route(
            "/webhook/",
            get(verify_webhook).head(head_webhook).post(receive_webhook),
        )
        .with_state(state)
}
