//! Structured observability for the webhook core
//!
//! The handlers never log directly; they report [`Observation`]s to an
//! injected [`WebhookObserver`]. [`TracingObserver`] turns them into `tracing`
//! events, [`RecordingObserver`] keeps them in memory, and
//! [`CountingObserver`] feeds the `/status` counters before forwarding.
//!
//! Observers are called concurrently from request handlers and detached
//! tasks, so implementations must be `Send + Sync`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::handlers::status::WebhookStats;
use crate::webhook::verification::VerificationFailure;

/// One observable step of the webhook pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A handshake succeeded
    Verified,

    /// A handshake was rejected
    VerificationFailed {
        /// Rejection reason (never includes token values)
        reason: VerificationFailure,
    },

    /// A POST was captured
    EventReceived {
        /// `Content-Type` header, if present and textual
        content_type: Option<String>,
        /// Number of headers captured
        header_count: usize,
        /// Captured body size in bytes
        body_bytes: usize,
        /// Leading part of the body as text
        body_preview: String,
    },

    /// Headers or body could not be captured; the request proceeds regardless
    CaptureFailed {
        /// What failed
        error: String,
    },

    /// A processing task was handed to the spawner
    TaskDispatched {
        /// Task id
        task_id: Uuid,
    },

    /// The spawner refused the task; it runs inline before the response
    DispatchFallback {
        /// Task id
        task_id: Uuid,
        /// Spawner error
        error: DispatchError,
    },

    /// The payload did not parse; nothing to process
    PayloadAbsent {
        /// Task id
        task_id: Uuid,
    },

    /// The validator did not recognize the payload
    EventRejected {
        /// Task id
        task_id: Uuid,
    },

    /// The processor completed
    EventProcessed {
        /// Task id
        task_id: Uuid,
    },

    /// The validator or processor failed; the failure is not retried
    ProcessingFailed {
        /// Task id
        task_id: Uuid,
        /// Error or panic message
        error: String,
        /// Compact payload rendering for context
        payload: String,
    },
}

/// Sink for [`Observation`]s
pub trait WebhookObserver: Send + Sync + 'static {
    /// Record one observation
    fn observe(&self, observation: &Observation);
}

/// Emits every observation as a structured `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl WebhookObserver for TracingObserver {
    fn observe(&self, observation: &Observation) {
        match observation {
            Observation::Verified => info!("Webhook verified"),
            Observation::VerificationFailed { reason } => {
                info!(reason = reason.as_str(), "Webhook verification failed")
            }
            Observation::EventReceived {
                content_type,
                header_count,
                body_bytes,
                body_preview,
            } => {
                info!(
                    content_type = content_type.as_deref().unwrap_or("-"),
                    header_count,
                    body_bytes,
                    "Incoming webhook event"
                );
                debug!(body = %body_preview, "Incoming webhook body");
            }
            Observation::CaptureFailed { error } => {
                warn!(error = %error, "Failed to capture webhook request for diagnostics")
            }
            Observation::TaskDispatched { task_id } => {
                debug!(task_id = %task_id, "Processing task dispatched")
            }
            Observation::DispatchFallback { task_id, error } => warn!(
                task_id = %task_id,
                error = %error,
                "Detached dispatch failed, processing inline"
            ),
            Observation::PayloadAbsent { task_id } => {
                debug!(task_id = %task_id, "Payload absent, nothing to process")
            }
            Observation::EventRejected { task_id } => {
                debug!(task_id = %task_id, "Payload is not a recognized event")
            }
            Observation::EventProcessed { task_id } => {
                info!(task_id = %task_id, "Event processed")
            }
            Observation::ProcessingFailed {
                task_id,
                error,
                payload,
            } => error!(
                task_id = %task_id,
                error = %error,
                payload = %payload,
                "Event processing failed"
            ),
        }
    }
}

/// Keeps observations in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<Observation>>,
}

impl RecordingObserver {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn observations(&self) -> Vec<Observation> {
        self.records.lock().clone()
    }

    /// Number of recorded observations matching a predicate
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Observation) -> bool,
    {
        self.records.lock().iter().filter(|o| predicate(o)).count()
    }

    /// Drop all recorded observations
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl WebhookObserver for RecordingObserver {
    fn observe(&self, observation: &Observation) {
        self.records.lock().push(observation.clone());
    }
}

/// Updates [`WebhookStats`] and forwards to an inner observer
pub struct CountingObserver {
    stats: Arc<WebhookStats>,
    inner: Arc<dyn WebhookObserver>,
}

impl CountingObserver {
    /// Wrap `inner`, counting into `stats`
    pub fn new(stats: Arc<WebhookStats>, inner: Arc<dyn WebhookObserver>) -> Self {
        Self { stats, inner }
    }
}

impl WebhookObserver for CountingObserver {
    fn observe(&self, observation: &Observation) {
        self.stats.record(observation);
        self.inner.observe(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        let task_id = Uuid::new_v4();

        observer.observe(&Observation::Verified);
        observer.observe(&Observation::EventProcessed { task_id });

        assert_eq!(
            observer.observations(),
            vec![
                Observation::Verified,
                Observation::EventProcessed { task_id }
            ]
        );
        assert_eq!(
            observer.count(|o| matches!(o, Observation::EventProcessed { .. })),
            1
        );

        observer.clear();
        assert!(observer.observations().is_empty());
    }

    #[test]
    fn test_counting_observer_forwards() {
        let stats = Arc::new(WebhookStats::new());
        let recorder = Arc::new(RecordingObserver::new());
        let observer = CountingObserver::new(stats.clone(), recorder.clone());

        observer.observe(&Observation::Verified);
        observer.observe(&Observation::VerificationFailed {
            reason: VerificationFailure::ModeMismatch,
        });

        assert_eq!(recorder.observations().len(), 2);
        assert_eq!(stats.snapshot().verifications_succeeded, 1);
        assert_eq!(stats.snapshot().verifications_failed, 1);
    }

    #[test]
    fn test_tracing_observer_handles_every_variant() {
        let task_id = Uuid::new_v4();
        let observer = TracingObserver;
        for observation in [
            Observation::Verified,
            Observation::VerificationFailed {
                reason: VerificationFailure::TokenMismatch,
            },
            Observation::EventReceived {
                content_type: None,
                header_count: 0,
                body_bytes: 0,
                body_preview: String::new(),
            },
            Observation::CaptureFailed {
                error: "boom".to_string(),
            },
            Observation::TaskDispatched { task_id },
            Observation::DispatchFallback {
                task_id,
                error: DispatchError::NoRuntime,
            },
            Observation::PayloadAbsent { task_id },
            Observation::EventRejected { task_id },
            Observation::EventProcessed { task_id },
            Observation::ProcessingFailed {
                task_id,
                error: "boom".to_string(),
                payload: "none".to_string(),
            },
        ] {
            observer.observe(&observation);
        }
    }
}
