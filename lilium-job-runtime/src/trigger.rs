//! Schedule triggers and fire-time arithmetic.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;

use crate::error::{JobError, Result};
use crate::time_unit::TimeUnit;

/// When a task becomes due
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Fire once, on the first tick after start (plus initial delay)
    Immediate,
    /// Fire every `period` on a fixed grid anchored at the first fire time
    Interval { period: Duration },
    /// Fire on every match of a cron expression (UTC)
    Cron(CronTrigger),
}

/// A validated cron expression
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    schedule: Schedule,
}

impl CronTrigger {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }
}

/// The `cron` crate wants `sec min hour dom mon dow [year]`; plain crontab
/// lines have no seconds field.
fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

impl Trigger {
    pub fn immediate() -> Self {
        Trigger::Immediate
    }

    pub fn interval(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(JobError::schedule(
                format!("{period:?}"),
                "period must be greater than zero",
            ));
        }
        if TimeDelta::from_std(period).is_err() {
            return Err(JobError::schedule(format!("{period:?}"), "period is too large"));
        }
        Ok(Trigger::Interval { period })
    }

    pub fn cron(expression: &str) -> Result<Self> {
        let normalized = normalize_cron(expression);
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| JobError::schedule(expression, e))?;
        if schedule.upcoming(Utc).next().is_none() {
            return Err(JobError::schedule(expression, "expression has no future fire time"));
        }
        Ok(Trigger::Cron(CronTrigger {
            expression: expression.trim().to_string(),
            schedule,
        }))
    }

    /// Parse the textual form used in configuration files.
    ///
    /// `immediate` / `@once`, `@every 5s` or a bare duration (`5s`,
    /// `500ms`), otherwise a cron expression.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(JobError::schedule(s, "empty schedule"));
        }
        if s.eq_ignore_ascii_case("immediate") || s == "@once" {
            return Ok(Trigger::Immediate);
        }
        if let Some(every) = s.strip_prefix("@every") {
            let period = TimeUnit::resolve(every, TimeUnit::Milliseconds)?;
            return Self::interval(period);
        }
        if let Some((value, unit)) = TimeUnit::parse_duration(s) {
            return Self::interval(unit.to_duration(value));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            return Self::interval(TimeUnit::resolve(s, TimeUnit::Milliseconds)?);
        }
        Self::cron(s)
    }

    /// First fire time for a scheduler started (after any initial delay) at `start`.
    pub(crate) fn first_fire(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Immediate => Some(start),
            Trigger::Interval { period } => Some(start + TimeDelta::from_std(*period).ok()?),
            Trigger::Cron(cron) => cron.after(start),
        }
    }

    /// Next fire time strictly after `now`, given the fire time that just came due.
    ///
    /// Intervals stay on the grid `previous + k * period`, so a late or
    /// skipped run never shifts later runs.
    pub(crate) fn next_fire(
        &self,
        previous: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Immediate => None,
            Trigger::Interval { period } => {
                let period_ns = i64::try_from(period.as_nanos()).ok()?;
                let elapsed_ns = (now - previous).num_nanoseconds()?.max(0);
                let steps = elapsed_ns / period_ns + 1;
                Some(previous + TimeDelta::nanoseconds(steps.checked_mul(period_ns)?))
            }
            Trigger::Cron(cron) => cron.after(now),
        }
    }
}

impl FromStr for Trigger {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        Trigger::parse(s)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Immediate => write!(f, "immediate"),
            Trigger::Interval { period } => write!(f, "every {period:?}"),
            Trigger::Cron(cron) => write!(f, "cron '{}'", cron.expression),
        }
    }
}
