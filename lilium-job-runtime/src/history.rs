//! Execution records and the bounded in-memory log that holds them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of records kept before the oldest are evicted
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// The handler returned an error
    Failed { reason: String },
    /// The invocation outlived its deadline (or the shutdown timeout)
    Timeout,
    /// The handler panicked
    Panicked { reason: String },
    /// Still in flight; only seen in [`Scheduler::running`](crate::Scheduler::running)
    Running,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Outcome report for one task invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub run_id: Uuid,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
}

impl ExecutionRecord {
    pub(crate) fn running(task: &str, run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            task: task.to_string(),
            started_at,
            finished_at: None,
            outcome: Outcome::Running,
        }
    }

    pub(crate) fn finish(mut self, outcome: Outcome) -> Self {
        self.finished_at = Some(Utc::now());
        self.outcome = outcome;
        self
    }

    /// Wall time between start and finish
    pub fn duration(&self) -> Option<chrono::TimeDelta> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

/// Append-only log of finalized records, bounded at `capacity`
#[derive(Debug)]
pub struct ExecutionLog {
    capacity: usize,
    records: Mutex<VecDeque<ExecutionRecord>>,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LIMIT)
    }
}

impl ExecutionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_LIMIT))),
        }
    }

    pub fn append(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// The most recent `limit` records of `task`, oldest first
    pub fn for_task(&self, task: &str, limit: usize) -> Vec<ExecutionRecord> {
        let records = self.records.lock();
        let mut matched: Vec<_> = records
            .iter()
            .rev()
            .filter(|r| r.task == task)
            .take(limit)
            .cloned()
            .collect();
        matched.reverse();
        matched
    }

    /// Every retained record, oldest first
    pub fn all(&self) -> Vec<ExecutionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(task: &str, outcome: Outcome) -> ExecutionRecord {
        ExecutionRecord::running(task, Uuid::new_v4(), Utc::now()).finish(outcome)
    }

    #[test]
    fn evicts_oldest_first() {
        let log = ExecutionLog::with_capacity(3);
        for i in 0..5 {
            log.append(record(&format!("t{i}"), Outcome::Success));
        }
        let tasks: Vec<_> = log.all().into_iter().map(|r| r.task).collect();
        assert_eq!(tasks, vec!["t2", "t3", "t4"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn for_task_returns_latest_in_order() {
        let log = ExecutionLog::default();
        log.append(record("a", Outcome::Success));
        log.append(record("b", Outcome::Timeout));
        log.append(record("a", Outcome::Failed { reason: "boom".into() }));
        log.append(record("a", Outcome::Success));

        let latest = log.for_task("a", 2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].outcome, Outcome::Failed { reason: "boom".into() });
        assert_eq!(latest[1].outcome, Outcome::Success);
        assert!(log.for_task("missing", 10).is_empty());
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let log = Arc::new(ExecutionLog::with_capacity(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        log.append(record(&format!("w{t}"), Outcome::Success));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(log.len(), 2_000);
        assert_eq!(log.for_task("w3", usize::MAX).len(), 250);
    }

    #[test]
    fn finished_record_has_duration() {
        let rec = record("a", Outcome::Success);
        assert!(rec.finished_at.is_some());
        assert!(rec.duration().unwrap() >= chrono::TimeDelta::zero());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::Panicked { reason: "oops".into() }).unwrap();
        assert_eq!(json["status"], "panicked");
        assert_eq!(json["reason"], "oops");
    }
}
