//! # Lilium Job - named task scheduling for async Rust services
//!
//! Register named tasks, each with a trigger, and let one scheduler run
//! them on a tokio runtime with per-task timeouts, panic containment and
//! graceful shutdown.
//!
//! ## Features
//!
//! - **Immediate**: run once as soon as the scheduler starts
//! - **Interval**: run on a fixed grid (`"30s"`, `"@every 5m"`, `500`)
//! - **Cron**: standard 5-field or 6-field cron expressions, evaluated in UTC
//! - **No overlap**: a task never runs concurrently with itself
//! - **Config support**: schedules live in YAML/TOML under `jobs.tasks`,
//!   with `${key:default}` placeholders and `LILIUM_` environment overrides
//! - **History**: bounded in-memory log of every finished invocation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lilium_job::{JobContext, SchedulerBuilder, Trigger};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     lilium_job::init_tracing();
//!
//!     let scheduler = SchedulerBuilder::new().build();
//!     scheduler.register_task("warmup", Trigger::immediate(), |ctx: JobContext| async move {
//!         tracing::info!(task = ctx.task_name(), "warming caches");
//!         anyhow::Ok(())
//!     })?;
//!     scheduler.register_task("report", Trigger::cron("0 */5 * * * *")?, |_ctx: JobContext| async {
//!         anyhow::Ok(())
//!     })?;
//!
//!     scheduler.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     scheduler.shutdown(Duration::from_secs(10)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Create `test.yaml`:
//!
//! ```yaml
//! jobs:
//!   tick: 1s
//!   shutdown_timeout: 30s
//!   tasks:
//!     test-job:
//!       schedule: "${app.job_interval:10s}"
//!       timeout: 5s
//! ```
//!
//! and hand it to a [`JobModule`]:
//!
//! ```rust,no_run
//! use lilium_job::{JobContext, JobModule};
//!
//! # async fn run() -> Result<(), lilium_job::JobError> {
//! let module = JobModule::from_yaml("test.yaml")?;
//! module.register_task("test-job", |_ctx: JobContext| async {
//!     tracing::info!("Hello from job");
//!     anyhow::Ok(())
//! })?;
//! module.start_all().await?;
//! module.shutdown_on_signal().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Any key can be overridden from the environment:
//!
//! ```bash
//! export LILIUM_JOBS__TICK=250ms
//! export LILIUM_JOBS__SHUTDOWN_TIMEOUT=5s
//! ```

// Re-export core types
pub use lilium_job_runtime::{
    load_toml_config, load_yaml_config, resolve_config_value, CronTrigger, ExecutionLog,
    ExecutionRecord, ExecutionSink, JobContext, JobError, JobFuture, JobModule,
    JobsConfig, Outcome, Registry, Result, Runnable, Scheduler, SchedulerBuilder,
    SchedulerState, StopStatus, TaskConfig, TaskDefinition, TaskDefinitionBuilder, TaskOptions,
    TimeUnit, TracingSink, Trigger, DEFAULT_HISTORY_LIMIT, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_TICK,
};

// Full runtime path for callers that want it
pub use lilium_job_runtime;

/// Install a default env-filtered fmt subscriber unless one is already set.
///
/// Reads `RUST_LOG`, falling back to `info`.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
