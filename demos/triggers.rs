//! Tour of the trigger kinds plus failure handling, without a config file.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example triggers
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lilium_job::{JobContext, JobFuture, Runnable, SchedulerBuilder, TaskDefinition, Trigger};

struct AppState {
    name: &'static str,
    ticks: AtomicU32,
}

/// Stateful task implemented through the trait instead of a closure
struct Heartbeat {
    beats: AtomicU32,
}

impl Runnable for Heartbeat {
    fn run(&self, ctx: JobContext) -> JobFuture<'_> {
        Box::pin(async move {
            let n = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(app) = ctx.app::<AppState>() {
                app.ticks.fetch_add(1, Ordering::SeqCst);
                tracing::info!(app = app.name, beat = n, "[HEARTBEAT]");
            }
            anyhow::Ok(())
        })
    }
}

async fn fragile(_ctx: JobContext) -> anyhow::Result<()> {
    panic!("fragile task always panics");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lilium_job::init_tracing();

    let scheduler = SchedulerBuilder::new()
        .tick(Duration::from_millis(50))
        .history_limit(128)
        .app_context(AppState {
            name: "triggers-demo",
            ticks: AtomicU32::new(0),
        })
        .build();

    scheduler.register_task("warmup", Trigger::immediate(), |_ctx: JobContext| async {
        tracing::info!("[WARMUP] runs once at start");
        anyhow::Ok(())
    })?;

    scheduler.register_task(
        "heartbeat",
        Trigger::parse("500ms")?,
        Heartbeat {
            beats: AtomicU32::new(0),
        },
    )?;

    scheduler.register_task("every-second", Trigger::cron("* * * * * *")?, |ctx: JobContext| async move {
        tracing::info!(run_id = %ctx.run_id(), "[CRON] top of the second");
        anyhow::Ok(())
    })?;

    // slower than its own period: overlapping ticks are dropped
    scheduler.register(
        TaskDefinition::builder("slow", Trigger::parse("200ms")?, |ctx: JobContext| async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(700)) => {}
                _ = ctx.cancelled() => tracing::info!("[SLOW] cancelled"),
            }
            anyhow::Ok(())
        })
        .timeout(Duration::from_secs(1))
        .build(),
    )?;

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    scheduler.register_task("flaky", Trigger::parse("1s")?, move |_ctx: JobContext| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                anyhow::bail!("upstream unavailable");
            }
            Ok(())
        }
    })?;

    scheduler.register(
        TaskDefinition::builder("fragile", Trigger::parse("1500ms")?, fragile)
            .initial_delay(Duration::from_millis(500))
            .build(),
    )?;

    scheduler.start().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let abandoned = scheduler.shutdown(Duration::from_secs(2)).await?;
    if !abandoned.is_empty() {
        tracing::warn!(?abandoned, "tasks still running at shutdown");
    }

    for name in scheduler.task_names() {
        let runs = scheduler.execution_history(&name, usize::MAX);
        let ok = runs.iter().filter(|r| r.outcome.is_success()).count();
        tracing::info!(task = %name, runs = runs.len(), ok, "summary");
    }
    tracing::info!(flaky_attempts = attempts.load(Ordering::SeqCst), "done");
    Ok(())
}
