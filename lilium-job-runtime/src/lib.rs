//! Lilium Job Runtime - core runtime for scheduled task execution
//!
//! Named tasks are registered with a [`Trigger`] (immediate, fixed interval
//! or cron), dispatched by a single scheduling loop and run in their own
//! tokio task, with panics and errors contained and every outcome kept in a
//! bounded [`ExecutionLog`].

mod config;
mod context;
mod error;
mod executor;
mod history;
mod module;
mod registry;
mod runnable;
mod scheduler;
mod sink;
mod task;
mod time_unit;
mod trigger;

// Re-export public API
pub use config::{
    load_toml_config, load_yaml_config, resolve_config_value, JobsConfig, TaskConfig,
    DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_TICK,
};
pub use context::JobContext;
pub use error::{JobError, Result};
pub use history::{ExecutionLog, ExecutionRecord, Outcome, DEFAULT_HISTORY_LIMIT};
pub use module::{JobModule, StopStatus};
pub use registry::Registry;
pub use runnable::{JobFuture, Runnable};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerState};
pub use sink::{ExecutionSink, TracingSink};
pub use task::{TaskDefinition, TaskDefinitionBuilder, TaskOptions};
pub use time_unit::TimeUnit;
pub use trigger::{CronTrigger, Trigger};
