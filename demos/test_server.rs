//! Minimal service wiring: load `test.yaml`, register `test-job`, run until ctrl-c.
//!
//! ```bash
//! cargo run --example test-server
//! ```

use lilium_job::{JobContext, JobModule, StopStatus};

const DEFAULT_CONFIG: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../demos/test.yaml");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lilium_job::init_tracing();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let module = JobModule::from_yaml(&path)?;

    module.register_task("test-job", |ctx: JobContext| async move {
        tracing::info!(task = ctx.task_name(), run_id = %ctx.run_id(), "Hello from job");
        anyhow::Ok(())
    })?;
    module.register_task("nightly-report", |_ctx: JobContext| async {
        tracing::info!("nightly report generated");
        anyhow::Ok(())
    })?;

    module.start_all().await?;
    tracing::info!(config = %path, "test server running, press ctrl-c to stop");

    match module.shutdown_on_signal().await {
        Ok(StopStatus::Stopped) => tracing::info!("bye"),
        Ok(status) => tracing::info!(?status, "nothing to stop"),
        Err(e) => tracing::warn!(error = %e, "stopped with leftovers"),
    }

    for record in module.scheduler().execution_history("test-job", 5) {
        tracing::info!(
            run_id = %record.run_id,
            started_at = %record.started_at,
            outcome = ?record.outcome,
            "recent run"
        );
    }
    Ok(())
}
