use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Host-supplied value shared with every handler invocation
pub(crate) type AppContext = Arc<dyn Any + Send + Sync>;

/// Execution context handed to a task handler for one invocation.
///
/// Cancellation is cooperative: the token fires when the invocation
/// deadline passes or the scheduler shuts down, and a long-running handler
/// should watch [`JobContext::cancelled`] to stop promptly.
#[derive(Clone)]
pub struct JobContext {
    task: Arc<str>,
    run_id: Uuid,
    deadline: Option<DateTime<Utc>>,
    cancel: CancellationToken,
    app: Option<AppContext>,
}

impl JobContext {
    pub(crate) fn new(
        task: Arc<str>,
        run_id: Uuid,
        deadline: Option<DateTime<Utc>>,
        cancel: CancellationToken,
        app: Option<AppContext>,
    ) -> Self {
        Self {
            task,
            run_id,
            deadline,
            cancel,
            app,
        }
    }

    /// Name of the task being run
    pub fn task_name(&self) -> &str {
        &self.task
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wall-clock deadline of this invocation, if the task has a timeout
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the invocation is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Token for handing cancellation down to spawned sub-work
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Borrow the host application context if it is a `T`
    pub fn app<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.app.as_deref().and_then(|app| app.downcast_ref::<T>())
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("task", &self.task)
            .field("run_id", &self.run_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
