use std::future::Future;
use std::pin::Pin;

use crate::context::JobContext;

/// Boxed future returned by [`Runnable::run`]
pub type JobFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Body of a schedulable task.
///
/// Any `Fn(JobContext) -> impl Future<Output = anyhow::Result<()>>` closure
/// is a `Runnable`, so most tasks are registered as plain closures. Implement
/// the trait directly when the task carries its own state.
///
/// # Example
///
/// ```rust
/// use lilium_job_runtime::{JobContext, JobFuture, Runnable};
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// struct CacheSweep {
///     sweeps: AtomicU32,
/// }
///
/// impl Runnable for CacheSweep {
///     fn run(&self, ctx: JobContext) -> JobFuture<'_> {
///         Box::pin(async move {
///             let n = self.sweeps.fetch_add(1, Ordering::Relaxed);
///             tracing::info!(task = ctx.task_name(), sweep = n + 1, "sweeping cache");
///             anyhow::Ok(())
///         })
///     }
/// }
/// ```
pub trait Runnable: Send + Sync {
    /// Execute one invocation of the task
    fn run(&self, ctx: JobContext) -> JobFuture<'_>;
}

impl<F, Fut> Runnable for F
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(&self, ctx: JobContext) -> JobFuture<'_> {
        Box::pin(self(ctx))
    }
}
