//! Configuration loading for the job module.
//!
//! Settings live under a `jobs` section of a TOML or YAML file and can be
//! overridden from the environment (`LILIUM_JOBS__TICK=500ms`). Any string
//! value may be a `${key}` or `${key:default}` placeholder that is resolved
//! against the whole file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{JobError, Result};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::task::TaskOptions;
use crate::time_unit::TimeUnit;
use crate::trigger::Trigger;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

fn load_config(path: &Path, format: FileFormat) -> Result<Config> {
    let config = Config::builder()
        .add_source(File::from(path).format(format))
        .add_source(
            Environment::with_prefix("LILIUM")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    Ok(config)
}

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_config(path.as_ref(), FileFormat::Toml)
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_config(path.as_ref(), FileFormat::Yaml)
}

/// Resolve config placeholder like ${app.interval} or ${app.interval:default}
pub fn resolve_config_value(value: &str, config: &Config) -> Result<String> {
    let Some(inner) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Ok(value.to_string());
    };

    match inner.split_once(':') {
        Some((key, default_value)) => Ok(config
            .get_string(key)
            .unwrap_or_else(|_| default_value.to_string())),
        None => Ok(config.get_string(inner)?),
    }
}

/// Per-task entry of `jobs.tasks`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    pub schedule: String,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub initial_delay: Option<String>,
    #[serde(default)]
    pub enabled: Option<String>,
}

impl TaskConfig {
    pub fn trigger(&self) -> Result<Trigger> {
        Trigger::parse(&self.schedule)
    }

    pub fn options(&self) -> Result<TaskOptions> {
        let timeout = self
            .timeout
            .as_deref()
            .map(|t| TimeUnit::resolve(t, TimeUnit::Milliseconds))
            .transpose()?;
        let initial_delay = self
            .initial_delay
            .as_deref()
            .map(|d| TimeUnit::resolve(d, TimeUnit::Milliseconds))
            .transpose()?
            .unwrap_or(Duration::ZERO);
        let enabled = match self.enabled.as_deref().map(str::trim) {
            None => true,
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            Some(v) => return Err(JobError::schedule(v, "enabled must be true or false")),
        };
        Ok(TaskOptions {
            timeout,
            initial_delay,
            enabled,
        })
    }

    fn resolve(self, config: &Config) -> Result<Self> {
        let resolve_opt = |value: Option<String>| {
            value
                .map(|v| resolve_config_value(&v, config))
                .transpose()
        };
        Ok(Self {
            schedule: resolve_config_value(&self.schedule, config)?,
            timeout: resolve_opt(self.timeout)?,
            initial_delay: resolve_opt(self.initial_delay)?,
            enabled: resolve_opt(self.enabled)?,
        })
    }
}

/// The `jobs` section: scheduler settings plus per-task schedules
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub tick: Option<String>,
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default)]
    pub shutdown_timeout: Option<String>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

impl JobsConfig {
    /// Read the `jobs` section (missing section → defaults) and resolve placeholders
    pub fn from_config(config: &Config) -> Result<Self> {
        let raw: JobsConfig = match config.get("jobs") {
            Ok(raw) => raw,
            Err(config::ConfigError::NotFound(_)) => JobsConfig::default(),
            Err(e) => return Err(e.into()),
        };

        let tasks = raw
            .tasks
            .into_iter()
            .map(|(name, task)| Ok((name, task.resolve(config)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self {
            tick: raw
                .tick
                .map(|v| resolve_config_value(&v, config))
                .transpose()?,
            history_limit: raw.history_limit,
            shutdown_timeout: raw
                .shutdown_timeout
                .map(|v| resolve_config_value(&v, config))
                .transpose()?,
            tasks,
        })
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_config(&load_yaml_config(path)?)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_config(&load_toml_config(path)?)
    }

    pub fn tick(&self) -> Result<Duration> {
        match self.tick.as_deref() {
            Some(tick) => {
                let tick = TimeUnit::resolve(tick, TimeUnit::Milliseconds)?;
                if tick.is_zero() {
                    return Err(JobError::schedule("0", "tick must be greater than zero"));
                }
                Ok(tick)
            }
            None => Ok(DEFAULT_TICK),
        }
    }

    pub fn shutdown_timeout(&self) -> Result<Duration> {
        self.shutdown_timeout
            .as_deref()
            .map(|t| TimeUnit::resolve(t, TimeUnit::Milliseconds))
            .transpose()
            .map(|t| t.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT))
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml(contents: &str) -> Config {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Yaml))
            .build()
            .unwrap()
    }

    #[test]
    fn plain_values_pass_through() {
        let config = Config::default();
        assert_eq!(resolve_config_value("5s", &config).unwrap(), "5s");
    }

    #[test]
    fn placeholders_resolve_with_and_without_default() {
        let config = yaml("app:\n  interval: 10s\n");
        assert_eq!(
            resolve_config_value("${app.interval}", &config).unwrap(),
            "10s"
        );
        assert_eq!(
            resolve_config_value("${app.missing:250ms}", &config).unwrap(),
            "250ms"
        );
        assert!(matches!(
            resolve_config_value("${app.missing}", &config),
            Err(JobError::Config(_))
        ));
    }

    #[test]
    fn jobs_section_is_parsed_and_resolved() {
        let config = yaml(
            r#"
app:
  report_every: 5s
jobs:
  tick: 250ms
  history_limit: 16
  shutdown_timeout: 2s
  tasks:
    test-job:
      schedule: "${app.report_every}"
      timeout: 1s
      enabled: true
    nightly:
      schedule: "0 3 * * *"
      initial_delay: 500
      enabled: "${app.nightly_enabled:false}"
"#,
        );
        let jobs = JobsConfig::from_config(&config).unwrap();
        assert_eq!(jobs.tick().unwrap(), Duration::from_millis(250));
        assert_eq!(jobs.shutdown_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(jobs.history_limit(), 16);

        let test_job = jobs.task("test-job").unwrap();
        assert!(matches!(test_job.trigger().unwrap(), Trigger::Interval { .. }));
        let options = test_job.options().unwrap();
        assert_eq!(options.timeout, Some(Duration::from_secs(1)));
        assert!(options.enabled);

        let nightly = jobs.task("nightly").unwrap().options().unwrap();
        assert_eq!(nightly.initial_delay, Duration::from_millis(500));
        assert!(!nightly.enabled);
    }

    #[test]
    fn missing_jobs_section_gives_defaults() {
        let jobs = JobsConfig::from_config(&yaml("app:\n  name: demo\n")).unwrap();
        assert_eq!(jobs.tick().unwrap(), DEFAULT_TICK);
        assert_eq!(jobs.shutdown_timeout().unwrap(), DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(jobs.history_limit(), DEFAULT_HISTORY_LIMIT);
        assert!(jobs.tasks.is_empty());
    }

    #[test]
    fn invalid_enabled_flag_is_rejected() {
        let task = TaskConfig {
            schedule: "1s".into(),
            enabled: Some("maybe".into()),
            ..Default::default()
        };
        assert!(task.options().is_err());
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[jobs]
tick = "100ms"

[jobs.tasks.cleanup]
schedule = "@every 2m"
"#
        )
        .unwrap();

        let jobs = JobsConfig::from_toml(file.path()).unwrap();
        assert_eq!(jobs.tick().unwrap(), Duration::from_millis(100));
        match jobs.task("cleanup").unwrap().trigger().unwrap() {
            Trigger::Interval { period } => assert_eq!(period, Duration::from_secs(120)),
            other => panic!("unexpected trigger {other}"),
        }
    }

    #[test]
    fn missing_file_is_a_config_error() {
        assert!(matches!(
            JobsConfig::from_yaml("/nonexistent/jobs.yaml"),
            Err(JobError::Config(_))
        ));
    }
}
