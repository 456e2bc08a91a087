//! Single-invocation execution with deadline, cancellation and panic
//! containment.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::TimeDelta;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::context::{AppContext, JobContext};
use crate::history::{ExecutionLog, ExecutionRecord, Outcome};
use crate::sink::ExecutionSink;
use crate::task::TaskDefinition;

/// Guards the single write of an invocation's final record.
///
/// Shared by the worker and by shutdown, which finalizes abandoned
/// invocations itself.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordSlot {
    finalized: Arc<AtomicBool>,
}

/// Runs task handlers and reports their outcome.
///
/// Only reachable through the scheduler's dispatch, which owns admission
/// (state check, one run per task, cancellation from the root token).
#[derive(Clone)]
pub(crate) struct Executor {
    log: Arc<ExecutionLog>,
    sink: Option<Arc<dyn ExecutionSink>>,
    app: Option<AppContext>,
}

impl Executor {
    pub(crate) fn new(
        log: Arc<ExecutionLog>,
        sink: Option<Arc<dyn ExecutionSink>>,
        app: Option<AppContext>,
    ) -> Self {
        Self { log, sink, app }
    }

    /// Run one admitted invocation of `task` to completion and return its
    /// record. The record is also appended to the log and forwarded to the
    /// sink.
    pub(crate) async fn invoke(
        &self,
        task: Arc<TaskDefinition>,
        run: ExecutionRecord,
        cancel: CancellationToken,
        slot: RecordSlot,
    ) -> ExecutionRecord {
        let timeout = task.options.timeout;
        let deadline = timeout
            .and_then(|t| TimeDelta::from_std(t).ok())
            .map(|t| run.started_at + t);
        let ctx = JobContext::new(
            task.name.clone(),
            run.run_id,
            deadline,
            cancel.clone(),
            self.app.clone(),
        );

        let span = info_span!("job", task = %task.name, run_id = %run.run_id);
        let handler = task.handler.clone();
        let body = AssertUnwindSafe(async move { handler.run(ctx).await }.instrument(span))
            .catch_unwind();
        tokio::pin!(body);

        debug!(task = %task.name, run_id = %run.run_id, "invocation started");

        let outcome = match timeout {
            Some(timeout) => tokio::select! {
                result = &mut body => outcome_of(result),
                _ = tokio::time::sleep(timeout) => {
                    cancel.cancel();
                    let record = run.finish(Outcome::Timeout);
                    self.finalize(&slot, &record);
                    warn!(
                        task = %task.name,
                        run_id = %record.run_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "deadline passed, waiting for handler to observe cancellation"
                    );
                    // the task's slot stays taken until the handler really returns
                    let _ = body.await;
                    return record;
                }
            },
            None => outcome_of(body.await),
        };

        let record = run.finish(outcome);
        self.finalize(&slot, &record);
        record
    }

    /// Write the final record once; later calls for the same slot are ignored
    pub(crate) fn finalize(&self, slot: &RecordSlot, record: &ExecutionRecord) -> bool {
        if slot.finalized.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.log.append(record.clone());
        if let Some(sink) = &self.sink {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.record(record))) {
                error!(
                    task = %record.task,
                    run_id = %record.run_id,
                    reason = %panic_reason(payload.as_ref()),
                    "execution sink panicked, record kept in log only"
                );
            }
        }
        true
    }
}

fn outcome_of(result: Result<anyhow::Result<()>, Box<dyn Any + Send>>) -> Outcome {
    match result {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(e)) => Outcome::Failed {
            reason: format!("{e:#}"),
        },
        Err(payload) => Outcome::Panicked {
            reason: panic_reason(payload.as_ref()),
        },
    }
}

pub(crate) fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
