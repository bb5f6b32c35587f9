//! Detached task dispatch
//!
//! Each acknowledged POST becomes one [`ProcessingTask`] that runs off the
//! request path. No join handle is kept; the task's only outlet is the
//! observer.
//!
//! # Architecture
//!
//! ```text
//! IntakeHandler
//!       |
//!       v
//! [TaskDispatcher::submit] --spawn ok--> detached: validate -> process
//!       |
//!   spawn refused
//!       |
//!       v
//! [run inline, then respond]
//! ```
//!
//! The number of in-flight tasks is not bounded. Under sustained load every
//! POST adds one task to the runtime.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::webhook::observer::{Observation, WebhookObserver};
use crate::webhook::payload::ParsedPayload;
use crate::webhook::processor::MessageHandler;

/// A unit of detached work
pub type TaskFuture = BoxFuture<'static, ()>;

/// A task the spawner refused, handed back for inline execution
pub struct SpawnRejected {
    /// Why the spawner refused
    pub error: DispatchError,
    /// The untouched task
    pub task: TaskFuture,
}

impl fmt::Debug for SpawnRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnRejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Launches tasks off the request path
pub trait TaskSpawner: Send + Sync + 'static {
    /// Start `task` without waiting for it, or give it back
    fn spawn(&self, task: TaskFuture) -> Result<(), SpawnRejected>;
}

/// Spawns onto the ambient tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: TaskFuture) -> Result<(), SpawnRejected> {
        match Handle::try_current() {
            Ok(handle) => {
                // Detached: the JoinHandle is dropped on purpose.
                drop(handle.spawn(task));
                Ok(())
            }
            Err(_) => Err(SpawnRejected {
                error: DispatchError::NoRuntime,
                task,
            }),
        }
    }
}

/// The payload of one POST, owned by its task
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    /// Correlation id for log records
    pub id: Uuid,
    /// Parsed body or absence marker
    pub payload: ParsedPayload,
}

impl ProcessingTask {
    /// Wrap a payload with a fresh id
    pub fn new(payload: ParsedPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
        }
    }
}

/// Terminal state of a processing task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The body did not parse and the validator declined it
    Absent,
    /// The validator declined a parsed payload
    Rejected,
    /// The processor completed
    Processed,
    /// The validator or processor failed
    Failed(String),
}

/// How a task was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Running detached
    Detached(Uuid),
    /// Already ran inline because the spawner refused it
    Inline(Uuid),
}

/// Hands processing tasks to a [`TaskSpawner`]
#[derive(Clone)]
pub struct TaskDispatcher {
    handler: Arc<dyn MessageHandler>,
    observer: Arc<dyn WebhookObserver>,
    spawner: Arc<dyn TaskSpawner>,
}

impl TaskDispatcher {
    /// Create a dispatcher that spawns on the ambient tokio runtime
    pub fn new(handler: Arc<dyn MessageHandler>, observer: Arc<dyn WebhookObserver>) -> Self {
        Self {
            handler,
            observer,
            spawner: Arc::new(TokioSpawner),
        }
    }

    /// Replace the spawner
    pub fn with_spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Submit a payload for processing.
    ///
    /// Returns as soon as the task is spawned. If the spawner refuses, the
    /// task runs to completion here before returning.
    pub async fn submit(&self, payload: ParsedPayload) -> Submission {
        let task = ProcessingTask::new(payload);
        let task_id = task.id;

        let future = run_task(self.handler.clone(), self.observer.clone(), task)
            .map(|_| ())
            .boxed();

        match self.spawner.spawn(future) {
            Ok(()) => {
                self.observer
                    .observe(&Observation::TaskDispatched { task_id });
                Submission::Detached(task_id)
            }
            Err(SpawnRejected { error, task }) => {
                self.observer
                    .observe(&Observation::DispatchFallback { task_id, error });
                task.await;
                Submission::Inline(task_id)
            }
        }
    }
}

/// Validate and process one task, containing every failure.
///
/// Errors and panics from the handler are reported once through the
/// observer and never propagate.
pub async fn run_task(
    handler: Arc<dyn MessageHandler>,
    observer: Arc<dyn WebhookObserver>,
    task: ProcessingTask,
) -> TaskOutcome {
    let ProcessingTask { id: task_id, payload } = task;

    let guarded = AssertUnwindSafe(async {
        if !handler.is_valid_message(&payload) {
            let outcome = if payload.is_absent() {
                TaskOutcome::Absent
            } else {
                TaskOutcome::Rejected
            };
            return Ok::<_, anyhow::Error>(outcome);
        }
        match payload.as_value() {
            Some(value) => handler
                .process_message(value)
                .await
                .map(|()| TaskOutcome::Processed),
            // A validator that accepts an absent payload has nothing to process.
            None => Ok(TaskOutcome::Absent),
        }
    })
    .catch_unwind()
    .await;

    let outcome = match guarded {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => TaskOutcome::Failed(format!("{e:#}")),
        Err(panic) => TaskOutcome::Failed(format!("handler panicked: {}", panic_message(&*panic))),
    };

    let observation = match &outcome {
        TaskOutcome::Absent => Observation::PayloadAbsent { task_id },
        TaskOutcome::Rejected => Observation::EventRejected { task_id },
        TaskOutcome::Processed => Observation::EventProcessed { task_id },
        TaskOutcome::Failed(error) => Observation::ProcessingFailed {
            task_id,
            error: error.clone(),
            payload: payload.describe(),
        },
    };
    observer.observe(&observation);

    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::observer::RecordingObserver;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct TestHandler {
        accept: bool,
        fail: bool,
        panic: bool,
        panic_validator: bool,
        validated: AtomicU32,
        processed: AtomicU32,
    }

    #[async_trait::async_trait]
    impl MessageHandler for TestHandler {
        fn is_valid_message(&self, _payload: &ParsedPayload) -> bool {
            self.validated.fetch_add(1, Ordering::SeqCst);
            if self.panic_validator {
                panic!("validator exploded");
            }
            self.accept
        }

        async fn process_message(&self, _payload: &Value) -> anyhow::Result<()> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("processor exploded");
            }
            if self.fail {
                anyhow::bail!("Simulated failure");
            }
            Ok(())
        }
    }

    struct RefusingSpawner;

    impl TaskSpawner for RefusingSpawner {
        fn spawn(&self, task: TaskFuture) -> Result<(), SpawnRejected> {
            Err(SpawnRejected {
                error: DispatchError::Rejected("shutting down".to_string()),
                task,
            })
        }
    }

    fn parsed() -> ParsedPayload {
        ParsedPayload::Parsed(json!({"object": "whatsapp_business_account"}))
    }

    #[tokio::test]
    async fn test_run_task_processes_recognized_event() {
        let handler = Arc::new(TestHandler {
            accept: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());

        let task = ProcessingTask::new(parsed());
        let task_id = task.id;
        let outcome = run_task(handler.clone(), observer.clone(), task).await;

        assert_eq!(outcome, TaskOutcome::Processed);
        assert_eq!(handler.processed.load(Ordering::SeqCst), 1);
        assert_eq!(
            observer.observations(),
            vec![Observation::EventProcessed { task_id }]
        );
    }

    #[tokio::test]
    async fn test_run_task_skips_processor_when_rejected() {
        let handler = Arc::new(TestHandler::default());
        let observer = Arc::new(RecordingObserver::new());

        let outcome = run_task(handler.clone(), observer, ProcessingTask::new(parsed())).await;

        assert_eq!(outcome, TaskOutcome::Rejected);
        assert_eq!(handler.validated.load(Ordering::SeqCst), 1);
        assert_eq!(handler.processed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_task_absent_payload_still_validated() {
        let handler = Arc::new(TestHandler::default());
        let observer = Arc::new(RecordingObserver::new());

        let outcome = run_task(
            handler.clone(),
            observer.clone(),
            ProcessingTask::new(ParsedPayload::Absent),
        )
        .await;

        assert_eq!(outcome, TaskOutcome::Absent);
        assert_eq!(handler.validated.load(Ordering::SeqCst), 1);
        assert_eq!(
            observer.count(|o| matches!(o, Observation::PayloadAbsent { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_run_task_contains_errors() {
        let handler = Arc::new(TestHandler {
            accept: true,
            fail: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());

        let outcome = run_task(handler.clone(), observer.clone(), ProcessingTask::new(parsed())).await;

        assert_eq!(outcome, TaskOutcome::Failed("Simulated failure".to_string()));
        assert_eq!(handler.processed.load(Ordering::SeqCst), 1);
        let failures = observer.count(|o| matches!(o, Observation::ProcessingFailed { .. }));
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_run_task_contains_panics() {
        let handler = Arc::new(TestHandler {
            accept: true,
            panic: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());

        let outcome = run_task(handler, observer.clone(), ProcessingTask::new(parsed())).await;

        match outcome {
            TaskOutcome::Failed(message) => assert!(message.contains("processor exploded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match &observer.observations()[..] {
            [Observation::ProcessingFailed { payload, .. }] => {
                assert!(payload.contains("whatsapp_business_account"))
            }
            other => panic!("unexpected observations: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_task_contains_validator_panics() {
        let handler = Arc::new(TestHandler {
            accept: true,
            panic_validator: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());

        let outcome = run_task(handler.clone(), observer.clone(), ProcessingTask::new(parsed())).await;

        match outcome {
            TaskOutcome::Failed(message) => assert!(message.contains("validator exploded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(handler.validated.load(Ordering::SeqCst), 1);
        assert_eq!(handler.processed.load(Ordering::SeqCst), 0);
        assert_eq!(
            observer.count(|o| matches!(o, Observation::ProcessingFailed { .. })),
            1
        );
        assert_eq!(observer.observations().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_detaches() {
        let handler = Arc::new(TestHandler {
            accept: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());
        let dispatcher = TaskDispatcher::new(handler.clone(), observer.clone());

        let submission = dispatcher.submit(parsed()).await;
        assert!(matches!(submission, Submission::Detached(_)));

        for _ in 0..50 {
            if handler.processed.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handler.processed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_falls_back_inline() {
        let handler = Arc::new(TestHandler {
            accept: true,
            ..Default::default()
        });
        let observer = Arc::new(RecordingObserver::new());
        let dispatcher = TaskDispatcher::new(handler.clone(), observer.clone())
            .with_spawner(Arc::new(RefusingSpawner));

        let submission = dispatcher.submit(parsed()).await;

        assert!(matches!(submission, Submission::Inline(_)));
        // Inline execution completes before submit returns.
        assert_eq!(handler.processed.load(Ordering::SeqCst), 1);
        assert_eq!(
            observer.count(|o| matches!(o, Observation::DispatchFallback { .. })),
            1
        );
    }

    #[test]
    fn test_tokio_spawner_without_runtime() {
        let result = TokioSpawner.spawn(async {}.boxed());
        match result {
            Err(rejected) => assert_eq!(rejected.error, DispatchError::NoRuntime),
            Ok(()) => panic!("spawn outside a runtime must be refused"),
        }
    }
}
