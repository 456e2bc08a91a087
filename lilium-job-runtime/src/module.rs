//! Config-driven job module: the piece a host application plugs in.
//!
//! ```rust,no_run
//! use lilium_job_runtime::{JobContext, JobModule};
//!
//! # async fn run() -> Result<(), lilium_job_runtime::JobError> {
//! let module = JobModule::from_yaml("test.yaml")?;
//! module.register_task("test-job", |ctx: JobContext| async move {
//!     tracing::info!(task = ctx.task_name(), "Hello from job");
//!     anyhow::Ok(())
//! })?;
//! module.start_all().await?;
//! module.shutdown_on_signal().await?;
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::JobsConfig;
use crate::error::{JobError, Result};
use crate::runnable::Runnable;
use crate::scheduler::{Scheduler, SchedulerBuilder, SchedulerState};
use crate::task::TaskDefinition;
use crate::trigger::Trigger;

/// Result of a successful [`JobModule::stop_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    /// `start_all` was never called
    NotStarted,
    /// Shut down cleanly by this call
    Stopped,
    /// An earlier call already stopped the module
    AlreadyStopped,
}

/// Owns one scheduler and the configuration its tasks are read from
pub struct JobModule {
    config: JobsConfig,
    scheduler: Scheduler,
    stop_requested: AtomicBool,
}

impl JobModule {
    pub fn new(config: JobsConfig) -> Result<Self> {
        let scheduler = SchedulerBuilder::with_config(&config)?.build();
        Ok(Self::with_scheduler(config, scheduler))
    }

    /// Use a scheduler built elsewhere (custom sink, app context, ...)
    pub fn with_scheduler(config: JobsConfig, scheduler: Scheduler) -> Self {
        Self {
            config,
            scheduler,
            stop_requested: AtomicBool::new(false),
        }
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(JobsConfig::from_yaml(path)?)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(JobsConfig::from_toml(path)?)
    }

    /// Shorthand for a module whose handlers receive `app` as their context
    pub fn with_app_context<T: Any + Send + Sync>(config: JobsConfig, app: T) -> Result<Self> {
        let scheduler = SchedulerBuilder::with_config(&config)?
            .app_context(app)
            .build();
        Ok(Self::with_scheduler(config, scheduler))
    }

    /// Register `handler` with the schedule configured under `jobs.tasks.<name>`
    pub fn register_task<R>(&self, name: &str, handler: R) -> Result<()>
    where
        R: Runnable + 'static,
    {
        let entry = self
            .config
            .task(name)
            .ok_or_else(|| JobError::Unconfigured(name.to_string()))?;
        let task = TaskDefinition::builder(name, entry.trigger()?, handler)
            .options(entry.options()?)
            .build();
        self.scheduler.register(task)
    }

    /// Register `handler` with an explicit trigger, ignoring the config file
    pub fn register_task_with<R>(&self, name: &str, trigger: Trigger, handler: R) -> Result<()>
    where
        R: Runnable + 'static,
    {
        self.scheduler.register_task(name, trigger, handler)
    }

    /// Close registration and start the scheduler.
    ///
    /// Names are already unique: the registry rejects duplicates at
    /// registration time.
    pub async fn start_all(&self) -> Result<()> {
        let registered = self.scheduler.task_names();
        for name in self.config.tasks.keys() {
            if !registered.contains(name) {
                warn!(task = %name, "task configured but never registered");
            }
        }

        self.scheduler.start().await?;
        info!(tasks = registered.len(), "job module started");
        Ok(())
    }

    /// Shut the scheduler down, waiting up to `timeout` for in-flight work.
    ///
    /// Abandoned invocations are reported as [`JobError::ShutdownTimeout`].
    pub async fn stop_all(&self, timeout: Duration) -> Result<StopStatus> {
        match self.scheduler.state() {
            SchedulerState::Idle => return Ok(StopStatus::NotStarted),
            SchedulerState::Draining | SchedulerState::Stopped => {
                return Ok(StopStatus::AlreadyStopped)
            }
            SchedulerState::Running => {}
        }
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return Ok(StopStatus::AlreadyStopped);
        }

        let abandoned = self.scheduler.shutdown(timeout).await?;
        if abandoned.is_empty() {
            info!("job module stopped");
            Ok(StopStatus::Stopped)
        } else {
            Err(JobError::ShutdownTimeout(abandoned))
        }
    }

    /// Wait for ctrl-c, then stop with the configured shutdown timeout
    pub async fn shutdown_on_signal(&self) -> Result<StopStatus> {
        let timeout = self.config.shutdown_timeout()?;
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c, stopping now");
        }
        info!("shutdown signal received");
        self.stop_all(timeout).await
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }
}
