use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::scheduler::Scheduler;
use crate::config::{JobsConfig, DEFAULT_TICK};
use crate::context::AppContext;
use crate::error::Result;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::sink::{ExecutionSink, TracingSink};

const MIN_TICK: Duration = Duration::from_millis(1);

/// Builder for the scheduler
pub struct SchedulerBuilder {
    pub(crate) tick: Duration,
    pub(crate) history_limit: usize,
    pub(crate) sink: Option<Arc<dyn ExecutionSink>>,
    pub(crate) app: Option<AppContext>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    /// Create a new scheduler builder: 1s tick, tracing sink, no app context
    pub fn new() -> Self {
        Self {
            tick: DEFAULT_TICK,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sink: Some(Arc::new(TracingSink)),
            app: None,
        }
    }

    /// Take tick resolution and history size from the `jobs` config section
    pub fn with_config(config: &JobsConfig) -> Result<Self> {
        Ok(Self::new()
            .tick(config.tick()?)
            .history_limit(config.history_limit()))
    }

    /// Resolution of the scheduling clock
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Number of execution records kept in memory
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Replace the default [`TracingSink`]
    pub fn sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Do not forward records anywhere besides the in-memory log
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// Value handed to every handler, readable through `JobContext::app`
    pub fn app_context<T: Any + Send + Sync>(mut self, app: T) -> Self {
        self.app = Some(Arc::new(app));
        self
    }

    /// Build the scheduler (does not start it yet)
    ///
    /// # Example
    ///
    /// ```rust
    /// use lilium_job_runtime::{JobContext, SchedulerBuilder, Trigger};
    /// use std::time::Duration;
    ///
    /// # fn main() -> Result<(), lilium_job_runtime::JobError> {
    /// let scheduler = SchedulerBuilder::new()
    ///     .tick(Duration::from_millis(100))
    ///     .build();
    ///
    /// scheduler.register_task("heartbeat", Trigger::parse("5s")?, |ctx: JobContext| async move {
    ///     tracing::info!(task = ctx.task_name(), "alive");
    ///     anyhow::Ok(())
    /// })?;
    /// // scheduler.start().await?;  <- inside a tokio runtime
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Scheduler {
        let tick = self.tick.max(MIN_TICK);
        info!(
            tick_ms = tick.as_millis() as u64,
            history_limit = self.history_limit,
            sink = self.sink.is_some(),
            "Building scheduler"
        );
        Scheduler::from_parts(tick, self.history_limit, self.sink, self.app)
    }
}
