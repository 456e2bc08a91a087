//! The scheduling loop. It is the only owner of the fire-time table.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::scheduler::{Dispatch, Inner};
use crate::task::TaskDefinition;

struct FireEntry {
    task: Arc<TaskDefinition>,
    next: DateTime<Utc>,
}

/// Build the fire-time table for tasks started at `start`, in registration order
fn fire_table(tasks: Vec<Arc<TaskDefinition>>, start: DateTime<Utc>) -> Vec<FireEntry> {
    tasks
        .into_iter()
        .filter_map(|task| {
            if !task.options.enabled {
                info!(task = %task.name, "[DISABLED] task will not be scheduled");
                return None;
            }
            let delay = TimeDelta::from_std(task.options.initial_delay).ok()?;
            let anchor = start.checked_add_signed(delay)?;
            match task.trigger.first_fire(anchor) {
                Some(next) => {
                    info!(task = %task.name, trigger = %task.trigger, first_fire = %next, "[SCHEDULED]");
                    Some(FireEntry { task, next })
                }
                None => {
                    warn!(task = %task.name, trigger = %task.trigger, "task has no fire time, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Tick until the root token is cancelled.
///
/// Scheduling time is derived from the tick instants rather than read from
/// the wall clock on wake-up, so one tick is exactly one resolution apart.
pub(crate) async fn run(
    inner: Arc<Inner>,
    tasks: Vec<Arc<TaskDefinition>>,
    base: Instant,
    base_utc: DateTime<Utc>,
) {
    let mut table = fire_table(tasks, base_utc);
    let mut ticker = tokio::time::interval_at(base, inner.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = inner.root.clone();

    loop {
        if table.is_empty() {
            debug!("no tasks left to schedule");
            shutdown.cancelled().await;
            break;
        }

        let tick_at = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            tick_at = ticker.tick() => tick_at,
        };
        let now = TimeDelta::from_std(tick_at - base)
            .ok()
            .and_then(|elapsed| base_utc.checked_add_signed(elapsed))
            .unwrap_or(base_utc);
        trace!(%now, "tick");

        let mut closed = false;
        table.retain_mut(|entry| {
            if closed || entry.next > now {
                return true;
            }
            match inner.dispatch(&entry.task, None) {
                Dispatch::Started(_) => {}
                Dispatch::StillRunning => {
                    debug!(task = %entry.task.name, due = %entry.next, "previous run still in flight, tick dropped");
                }
                Dispatch::Closed => {
                    closed = true;
                    return true;
                }
            }
            match entry.task.trigger.next_fire(entry.next, now) {
                Some(next) => {
                    entry.next = next;
                    true
                }
                None => false,
            }
        });

        if closed {
            break;
        }
    }

    debug!("scheduling loop exited");
}
