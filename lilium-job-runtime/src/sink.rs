use crate::history::{ExecutionRecord, Outcome};

/// Receives every finalized [`ExecutionRecord`].
///
/// Called from the worker that finished the invocation, so implementations
/// should hand off anything slow.
pub trait ExecutionSink: Send + Sync {
    fn record(&self, record: &ExecutionRecord);
}

/// Sink that reports records as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ExecutionSink for TracingSink {
    fn record(&self, record: &ExecutionRecord) {
        let duration_ms = record.duration().map(|d| d.num_milliseconds()).unwrap_or(0);
        match &record.outcome {
            Outcome::Success | Outcome::Running => tracing::info!(
                task = %record.task,
                run_id = %record.run_id,
                duration_ms,
                "task finished"
            ),
            Outcome::Failed { reason } => tracing::warn!(
                task = %record.task,
                run_id = %record.run_id,
                duration_ms,
                reason = %reason,
                "task failed"
            ),
            Outcome::Timeout => tracing::warn!(
                task = %record.task,
                run_id = %record.run_id,
                duration_ms,
                "task timed out"
            ),
            Outcome::Panicked { reason } => tracing::error!(
                task = %record.task,
                run_id = %record.run_id,
                duration_ms,
                reason = %reason,
                "task panicked"
            ),
        }
    }
}
