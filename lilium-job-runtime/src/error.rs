use thiserror::Error;

/// Result type for registration, lifecycle and configuration calls
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors returned synchronously by the job runtime.
///
/// Handler failures are not represented here: they are contained by the
/// executor and only show up as an [`Outcome`](crate::Outcome) in the
/// execution log.
#[derive(Debug, Error)]
pub enum JobError {
    /// A task with this name is already registered
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    /// No task with this name is registered
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    /// Registration attempted after the scheduler started
    #[error("registry is closed, cannot register '{0}'")]
    RegistryClosed(String),

    /// Malformed interval, duration or cron expression
    #[error("invalid schedule '{input}': {reason}")]
    ScheduleParse { input: String, reason: String },

    /// `register_task` was called for a name missing from the `jobs.tasks` config
    #[error("no schedule configured for task '{0}'")]
    Unconfigured(String),

    /// The scheduler has not been started yet
    #[error("scheduler is not running")]
    NotRunning,

    /// A manual run was requested while the task is still in flight
    #[error("task '{0}' is already running")]
    TaskBusy(String),

    /// The scheduler has been shut down and cannot be started again
    #[error("scheduler has been stopped")]
    SchedulerStopped,

    /// Shutdown gave up waiting on these in-flight invocations
    #[error("shutdown timed out, abandoned: {}", .0.join(", "))]
    ShutdownTimeout(Vec<String>),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl JobError {
    pub(crate) fn schedule(input: impl Into<String>, reason: impl ToString) -> Self {
        JobError::ScheduleParse {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_timeout_lists_abandoned_tasks() {
        let err = JobError::ShutdownTimeout(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "shutdown timed out, abandoned: a, b");
    }

    #[test]
    fn schedule_error_keeps_input() {
        let err = JobError::schedule("0s", "period must be greater than zero");
        match err {
            JobError::ScheduleParse { input, reason } => {
                assert_eq!(input, "0s");
                assert!(reason.contains("zero"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
