use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::builder::SchedulerBuilder;
use super::fire_loop;
use crate::context::AppContext;
use crate::error::{JobError, Result};
use crate::executor::{Executor, RecordSlot};
use crate::history::{ExecutionLog, ExecutionRecord, Outcome};
use crate::registry::Registry;
use crate::runnable::Runnable;
use crate::sink::ExecutionSink;
use crate::task::TaskDefinition;
use crate::trigger::Trigger;

/// Lifecycle of a scheduler instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, accepting registrations
    Idle,
    Running,
    /// Shutting down: no new invocations, in-flight ones may finish
    Draining,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Draining => write!(f, "Draining"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// What happened when a due task was offered for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Worker spawned for this run id
    Started(Uuid),
    /// Previous invocation of the same task has not returned yet
    StillRunning,
    /// Scheduler is not in the Running state
    Closed,
}

struct InFlight {
    run: ExecutionRecord,
    slot: RecordSlot,
    handle: JoinHandle<()>,
}

struct Runtime {
    state: SchedulerState,
    in_flight: HashMap<Arc<str>, InFlight>,
    fire_loop: Option<JoinHandle<()>>,
}

pub(crate) struct Inner {
    pub(crate) tick: Duration,
    registry: Mutex<Registry>,
    runtime: Mutex<Runtime>,
    log: Arc<ExecutionLog>,
    executor: Executor,
    /// Parent of every invocation's token; cancelled on shutdown
    pub(crate) root: CancellationToken,
}

/// Frees the task's in-flight slot however the worker ends, including
/// unwinding and abort.
struct ReleaseOnDrop {
    inner: Arc<Inner>,
    task: Arc<str>,
    run_id: Uuid,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.inner.release(&self.task, self.run_id);
    }
}

impl Inner {
    /// Admit one invocation of `task` if the scheduler is running and the
    /// task is idle. The finished record is sent on `reply` when given.
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        task: &Arc<TaskDefinition>,
        reply: Option<oneshot::Sender<ExecutionRecord>>,
    ) -> Dispatch {
        let mut runtime = self.runtime.lock();
        if runtime.state != SchedulerState::Running {
            return Dispatch::Closed;
        }
        if runtime.in_flight.contains_key(&task.name) {
            return Dispatch::StillRunning;
        }

        let run = ExecutionRecord::running(task.name(), Uuid::new_v4(), Utc::now());
        let run_id = run.run_id;
        let slot = RecordSlot::default();
        let cancel = self.root.child_token();

        let worker = {
            let inner = Arc::clone(self);
            let task = Arc::clone(task);
            let run = run.clone();
            let slot = slot.clone();
            async move {
                // built on first poll: a future dropped inside spawn() must not
                // take the runtime lock this thread already holds
                let release = ReleaseOnDrop {
                    inner: Arc::clone(&inner),
                    task: Arc::clone(&task.name),
                    run_id,
                };
                let record = inner.executor.invoke(task, run, cancel, slot).await;
                drop(release);
                if let Some(reply) = reply {
                    let _ = reply.send(record);
                }
            }
        };
        // release() waits on this lock, so the entry is in place first
        let handle = tokio::spawn(worker);
        runtime
            .in_flight
            .insert(Arc::clone(&task.name), InFlight { run, slot, handle });
        Dispatch::Started(run_id)
    }

    fn release(&self, task: &Arc<str>, run_id: Uuid) {
        let mut runtime = self.runtime.lock();
        if runtime
            .in_flight
            .get(task)
            .is_some_and(|flight| flight.run.run_id == run_id)
        {
            runtime.in_flight.remove(task);
        }
    }
}

/// Task scheduler: registry, fire-time loop and executor behind one handle.
///
/// Cloning is cheap and every clone drives the same instance; separate
/// `Scheduler::new()` calls give fully independent schedulers.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Scheduler with default settings
    pub fn new() -> Self {
        SchedulerBuilder::new().build()
    }

    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_parts(
        tick: Duration,
        history_limit: usize,
        sink: Option<Arc<dyn ExecutionSink>>,
        app: Option<AppContext>,
    ) -> Self {
        let log = Arc::new(ExecutionLog::with_capacity(history_limit));
        let executor = Executor::new(Arc::clone(&log), sink, app);
        Self {
            inner: Arc::new(Inner {
                tick,
                registry: Mutex::new(Registry::new()),
                runtime: Mutex::new(Runtime {
                    state: SchedulerState::Idle,
                    in_flight: HashMap::new(),
                    fire_loop: None,
                }),
                log,
                executor,
                root: CancellationToken::new(),
            }),
        }
    }

    /// Register `handler` under `name`, fired by `trigger`
    pub fn register_task<R>(&self, name: impl Into<String>, trigger: Trigger, handler: R) -> Result<()>
    where
        R: Runnable + 'static,
    {
        self.register(TaskDefinition::builder(name, trigger, handler).build())
    }

    /// Register a fully built definition
    pub fn register(&self, task: TaskDefinition) -> Result<()> {
        let name = task.name().to_string();
        let trigger = task.trigger().to_string();
        self.inner.registry.lock().register(task)?;
        debug!(task = %name, trigger = %trigger, "task registered");
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TaskDefinition>> {
        self.inner.registry.lock().lookup(name)
    }

    /// Registered task names in registration order
    pub fn task_names(&self) -> Vec<String> {
        self.inner
            .registry
            .lock()
            .tasks()
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Run a registered task now, outside its schedule, and wait for the record.
    ///
    /// Goes through the same admission as a due tick: the scheduler must be
    /// running, the task must not be in flight, and the invocation is
    /// cancelled and awaited by `shutdown` like any other.
    pub async fn run_now(&self, name: &str) -> Result<ExecutionRecord> {
        let task = self.lookup(name)?;
        let (tx, rx) = oneshot::channel();
        let run_id = match self.inner.dispatch(&task, Some(tx)) {
            Dispatch::Started(run_id) => run_id,
            Dispatch::StillRunning => return Err(JobError::TaskBusy(name.to_string())),
            Dispatch::Closed => {
                return Err(match self.state() {
                    SchedulerState::Idle => JobError::NotRunning,
                    _ => JobError::SchedulerStopped,
                })
            }
        };
        debug!(task = %name, %run_id, "manual run dispatched");

        match rx.await {
            Ok(record) => Ok(record),
            // worker aborted by shutdown; its record is finalized there
            Err(_) => self
                .inner
                .log
                .all()
                .into_iter()
                .rev()
                .find(|r| r.run_id == run_id)
                .ok_or(JobError::SchedulerStopped),
        }
    }

    /// Close the registry and begin ticking. Calling it again while running is a no-op.
    pub async fn start(&self) -> Result<()> {
        let mut runtime = self.inner.runtime.lock();
        match runtime.state {
            SchedulerState::Running => return Ok(()),
            SchedulerState::Draining | SchedulerState::Stopped => {
                return Err(JobError::SchedulerStopped)
            }
            SchedulerState::Idle => {}
        }

        let tasks: Vec<_> = {
            let mut registry = self.inner.registry.lock();
            registry.close();
            registry.tasks().cloned().collect()
        };

        info!(
            tasks = tasks.len(),
            tick_ms = self.inner.tick.as_millis() as u64,
            "Starting scheduler"
        );

        runtime.state = SchedulerState::Running;
        runtime.fire_loop = Some(tokio::spawn(fire_loop::run(
            Arc::clone(&self.inner),
            tasks,
            Instant::now(),
            Utc::now(),
        )));
        Ok(())
    }

    /// Stop dispatching, cancel in-flight invocations and wait up to
    /// `timeout` for them to return.
    ///
    /// Returns the names of tasks whose invocation was still running when
    /// the timeout elapsed; those invocations are aborted and recorded as
    /// [`Outcome::Timeout`]. A scheduler that never started, or one already
    /// shut down, returns an empty list straight away.
    pub async fn shutdown(&self, timeout: Duration) -> Result<Vec<String>> {
        let fire_loop = {
            let mut runtime = self.inner.runtime.lock();
            match runtime.state {
                SchedulerState::Idle => {
                    debug!("shutdown requested before start, nothing to stop");
                    return Ok(Vec::new());
                }
                SchedulerState::Draining | SchedulerState::Stopped => return Ok(Vec::new()),
                SchedulerState::Running => {}
            }
            runtime.state = SchedulerState::Draining;
            runtime.fire_loop.take()
        };

        info!(timeout_ms = timeout.as_millis() as u64, "Scheduler draining");
        let deadline = Instant::now() + timeout;
        self.inner.root.cancel();

        if let Some(fire_loop) = fire_loop {
            if let Err(e) = fire_loop.await {
                error!(error = %e, "scheduling loop ended abnormally");
            }
        }

        let mut in_flight: Vec<InFlight> = self
            .inner
            .runtime
            .lock()
            .in_flight
            .drain()
            .map(|(_, flight)| flight)
            .collect();
        in_flight.sort_by_key(|flight| flight.run.started_at);

        let mut abandoned = Vec::new();
        for mut flight in in_flight {
            if tokio::time::timeout_at(deadline, &mut flight.handle)
                .await
                .is_ok()
            {
                continue;
            }
            flight.handle.abort();
            let record = flight.run.finish(Outcome::Timeout);
            self.inner.executor.finalize(&flight.slot, &record);
            warn!(
                task = %record.task,
                run_id = %record.run_id,
                "invocation abandoned at shutdown"
            );
            abandoned.push(record.task);
        }

        self.inner.runtime.lock().state = SchedulerState::Stopped;
        info!(abandoned = abandoned.len(), "Scheduler stopped");
        Ok(abandoned)
    }

    /// The most recent `limit` finished invocations of `task`, oldest first
    pub fn execution_history(&self, task: &str, limit: usize) -> Vec<ExecutionRecord> {
        self.inner.log.for_task(task, limit)
    }

    /// Every retained record, oldest first
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.inner.log.all()
    }

    /// Snapshot of invocations currently in flight
    pub fn running(&self) -> Vec<ExecutionRecord> {
        let mut running: Vec<_> = self
            .inner
            .runtime
            .lock()
            .in_flight
            .values()
            .map(|flight| flight.run.clone())
            .collect();
        running.sort_by_key(|run| run.started_at);
        running
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.runtime.lock().state
    }

    pub fn tick(&self) -> Duration {
        self.inner.tick
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("tick", &self.inner.tick)
            .field("tasks", &self.inner.registry.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn noop(_ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn fast() -> Scheduler {
        Scheduler::builder()
            .tick(Duration::from_millis(10))
            .without_sink()
            .build()
    }

    #[tokio::test]
    async fn start_is_idempotent_and_closes_registry() {
        let scheduler = fast();
        scheduler
            .register_task("a", Trigger::parse("1h").unwrap(), noop)
            .unwrap();
        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let late = scheduler.register_task("b", Trigger::immediate(), noop);
        assert!(matches!(late, Err(JobError::RegistryClosed(_))));

        scheduler.shutdown(Duration::from_millis(100)).await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_before_start_is_a_noop() {
        let scheduler = fast();
        assert!(scheduler.shutdown(Duration::from_secs(1)).await.unwrap().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.start().await.unwrap();
        scheduler.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn restart_after_shutdown_is_rejected() {
        let scheduler = fast();
        scheduler.start().await.unwrap();
        scheduler.shutdown(Duration::from_millis(50)).await.unwrap();
        assert!(scheduler.shutdown(Duration::from_millis(50)).await.unwrap().is_empty());
        assert!(matches!(
            scheduler.start().await,
            Err(JobError::SchedulerStopped)
        ));
    }

    #[tokio::test]
    async fn nothing_runs_before_start() {
        let scheduler = fast();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        scheduler
            .register_task("early", Trigger::immediate(), move |_ctx: JobContext| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    anyhow::Ok(())
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        scheduler.shutdown(Duration::from_millis(100)).await.unwrap();
    }

    #[tokio::test]
    async fn lookup_and_task_names() {
        let scheduler = fast();
        scheduler.register_task("x", Trigger::immediate(), noop).unwrap();
        scheduler.register_task("y", Trigger::parse("2s").unwrap(), noop).unwrap();
        assert_eq!(scheduler.task_names(), vec!["x", "y"]);
        assert_eq!(scheduler.lookup("y").unwrap().name(), "y");
        assert!(matches!(scheduler.lookup("z"), Err(JobError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn run_now_requires_a_running_scheduler() {
        let scheduler = fast();
        scheduler.register_task("manual", Trigger::parse("1h").unwrap(), noop).unwrap();

        assert!(matches!(scheduler.run_now("manual").await, Err(JobError::NotRunning)));
        assert!(matches!(
            scheduler.run_now("missing").await,
            Err(JobError::TaskNotFound(_))
        ));
        assert!(scheduler.history().is_empty());

        scheduler.start().await.unwrap();
        let record = scheduler.run_now("manual").await.unwrap();
        assert_eq!(record.outcome, Outcome::Success);
        assert!(scheduler.running().is_empty());

        scheduler.shutdown(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(
            scheduler.run_now("manual").await,
            Err(JobError::SchedulerStopped)
        ));
    }

    #[tokio::test]
    async fn independent_instances_do_not_share_tasks() {
        let first = fast();
        let second = fast();
        first.register_task("shared-name", Trigger::immediate(), noop).unwrap();
        second.register_task("shared-name", Trigger::immediate(), noop).unwrap();
        assert_eq!(first.task_names(), second.task_names());
    }
}
