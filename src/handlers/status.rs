//! Status and health check handlers for the webhook receiver.
//!
//! This module provides HTTP endpoints for monitoring the receiver:
//! - `/status` - Webhook counters and acknowledgement latency
//! - `/health` - Simple health check for systemd/load balancers
//!
//! # Architecture
//!
//! ```text
//! Observation ──> CountingObserver ──> WebhookStats <── status_handler
//!                                       │    │
//!                                 Counters  LatencyHistogram
//! ```
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "whatsapp-webhook",
//!   "uptime_seconds": 3600,
//!   "counters": {
//!     "verifications_succeeded": 1,
//!     "verifications_failed": 0,
//!     "events_received": 1024,
//!     "capture_failures": 0,
//!     "tasks_dispatched": 1024,
//!     "inline_fallbacks": 0,
//!     "payloads_absent": 3,
//!     "events_rejected": 410,
//!     "events_processed": 610,
//!     "processing_failures": 1
//!   },
//!   "ack_latency": { "p50_ms": 0.2, "p95_ms": 0.6, "p99_ms": 1.1, ... },
//!   "status": "running",
//!   "timestamp": "2026-01-01T12:00:00Z"
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::webhook::observer::Observation;

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Response Types
// ============================================================================

/// Health check response for simple liveness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status (always "healthy" if responding)
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Detailed status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version (from Cargo.toml)
    pub version: String,

    /// Server name
    pub name: String,

    /// Server uptime in seconds
    pub uptime_seconds: u64,

    /// Webhook counters
    pub counters: WebhookCounters,

    /// Time from POST arrival to acknowledgement
    pub ack_latency: LatencyMetrics,

    /// Server status (always "running" if responding)
    pub status: String,

    /// ISO8601 timestamp of when status was generated
    pub timestamp: String,
}

/// Point-in-time copy of the webhook counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookCounters {
    /// Handshakes answered with the challenge
    pub verifications_succeeded: u64,
    /// Handshakes answered with 403
    pub verifications_failed: u64,
    /// POST deliveries captured
    pub events_received: u64,
    /// Header/body capture failures
    pub capture_failures: u64,
    /// Tasks handed to the spawner
    pub tasks_dispatched: u64,
    /// Tasks run inline because the spawner refused them
    pub inline_fallbacks: u64,
    /// Tasks whose body did not parse
    pub payloads_absent: u64,
    /// Tasks the validator declined
    pub events_rejected: u64,
    /// Tasks the processor completed
    pub events_processed: u64,
    /// Tasks whose validator or processor failed
    pub processing_failures: u64,
}

/// Request latency percentile metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// 50th percentile (median) latency in milliseconds
    pub p50_ms: f64,

    /// 95th percentile latency in milliseconds
    pub p95_ms: f64,

    /// 99th percentile latency in milliseconds
    pub p99_ms: f64,

    /// Total number of samples recorded
    pub total_requests: u64,

    /// Mean latency in milliseconds
    pub mean_ms: f64,

    /// Maximum latency recorded in milliseconds
    pub max_ms: f64,
}

// ============================================================================
// Latency Histogram
// ============================================================================

/// Thread-safe latency histogram for recording acknowledgement timings.
///
/// Tracks latencies from 1 microsecond to 60 seconds with 3 significant figures.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Histogram<u64>>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, 60_000_000, 3).expect("static histogram bounds are valid");
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a latency duration.
    ///
    /// Values outside the histogram bounds are clamped.
    pub fn record_duration(&self, duration: std::time::Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.inner.write().saturating_record(micros.max(1));
    }

    /// Get the total count of recorded values.
    pub fn count(&self) -> u64 {
        self.inner.read().len()
    }

    /// Get complete latency metrics, converted to milliseconds.
    pub fn metrics(&self) -> LatencyMetrics {
        let hist = self.inner.read();
        if hist.is_empty() {
            return LatencyMetrics::default();
        }
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: hist.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: hist.value_at_percentile(99.0) as f64 / 1000.0,
            total_requests: hist.len(),
            mean_ms: hist.mean() / 1000.0,
            max_ms: hist.max() as f64 / 1000.0,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Webhook Stats
// ============================================================================

/// Shared counters behind the `/status` endpoint.
///
/// Updated from observations (see
/// [`CountingObserver`](crate::webhook::observer::CountingObserver)) and from
/// the POST handler's latency measurement. All fields are lock-free atomics
/// except the histogram.
#[derive(Debug)]
pub struct WebhookStats {
    start_time: Instant,
    verifications_succeeded: AtomicU64,
    verifications_failed: AtomicU64,
    events_received: AtomicU64,
    capture_failures: AtomicU64,
    tasks_dispatched: AtomicU64,
    inline_fallbacks: AtomicU64,
    payloads_absent: AtomicU64,
    events_rejected: AtomicU64,
    events_processed: AtomicU64,
    processing_failures: AtomicU64,
    ack_latency: LatencyHistogram,
}

impl WebhookStats {
    /// Create zeroed stats; uptime starts now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            verifications_succeeded: AtomicU64::new(0),
            verifications_failed: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            tasks_dispatched: AtomicU64::new(0),
            inline_fallbacks: AtomicU64::new(0),
            payloads_absent: AtomicU64::new(0),
            events_rejected: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            processing_failures: AtomicU64::new(0),
            ack_latency: LatencyHistogram::new(),
        }
    }

    /// Get the server uptime in seconds.
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Count one observation.
    pub fn record(&self, observation: &Observation) {
        let counter = match observation {
            Observation::Verified => &self.verifications_succeeded,
            Observation::VerificationFailed { .. } => &self.verifications_failed,
            Observation::EventReceived { .. } => &self.events_received,
            Observation::CaptureFailed { .. } => &self.capture_failures,
            Observation::TaskDispatched { .. } => &self.tasks_dispatched,
            Observation::DispatchFallback { .. } => &self.inline_fallbacks,
            Observation::PayloadAbsent { .. } => &self.payloads_absent,
            Observation::EventRejected { .. } => &self.events_rejected,
            Observation::EventProcessed { .. } => &self.events_processed,
            Observation::ProcessingFailed { .. } => &self.processing_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the time it took to acknowledge one POST.
    #[inline]
    pub fn record_ack_latency(&self, duration: std::time::Duration) {
        self.ack_latency.record_duration(duration);
    }

    /// Acknowledgement latency percentiles.
    #[inline]
    pub fn ack_latency(&self) -> LatencyMetrics {
        self.ack_latency.metrics()
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> WebhookCounters {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        WebhookCounters {
            verifications_succeeded: load(&self.verifications_succeeded),
            verifications_failed: load(&self.verifications_failed),
            events_received: load(&self.events_received),
            capture_failures: load(&self.capture_failures),
            tasks_dispatched: load(&self.tasks_dispatched),
            inline_fallbacks: load(&self.inline_fallbacks),
            payloads_absent: load(&self.payloads_absent),
            events_rejected: load(&self.events_rejected),
            events_processed: load(&self.events_processed),
            processing_failures: load(&self.processing_failures),
        }
    }
}

impl Default for WebhookStats {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// # Route
/// `GET /health`
///
/// # Response
/// - `200 OK` - Always, if the server is running
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// Detailed status endpoint handler.
///
/// # Route
/// `GET /status`
///
/// # Response
/// - `200 OK` with JSON [`StatusResponse`]
#[instrument(skip_all)]
pub async fn status_handler(State(stats): State<Arc<WebhookStats>>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: stats.uptime_seconds(),
        counters: stats.snapshot(),
        ack_latency: stats.ack_latency(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

// ============================================================================
// Router Setup
// ============================================================================

/// Create the status router.
///
/// # Routes
/// - `GET /health` - Simple health check
/// - `GET /status` - Counters and acknowledgement latency
pub fn status_router(stats: Arc<WebhookStats>) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .with_state(stats)
}

// ============================================================================
// Tests
// ============================================================================
