use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::runnable::Runnable;
use crate::trigger::Trigger;

/// Per-task execution options
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Deadline for a single invocation; `None` runs unbounded
    pub timeout: Option<Duration>,
    /// Offset of the first fire time from scheduler start
    pub initial_delay: Duration,
    /// Disabled tasks stay registered but are never scheduled
    pub enabled: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            initial_delay: Duration::ZERO,
            enabled: true,
        }
    }
}

/// A named task with its trigger and handler.
///
/// Immutable once registered; the registry and the scheduler share it
/// through an `Arc`.
#[derive(Clone)]
pub struct TaskDefinition {
    pub(crate) name: Arc<str>,
    pub(crate) trigger: Trigger,
    pub(crate) options: TaskOptions,
    pub(crate) handler: Arc<dyn Runnable>,
}

impl TaskDefinition {
    /// Create a new builder for TaskDefinition
    pub fn builder<R>(name: impl Into<String>, trigger: Trigger, handler: R) -> TaskDefinitionBuilder
    where
        R: Runnable + 'static,
    {
        TaskDefinitionBuilder {
            name: name.into(),
            trigger,
            options: TaskOptions::default(),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn options(&self) -> &TaskOptions {
        &self.options
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder for TaskDefinition
pub struct TaskDefinitionBuilder {
    name: String,
    trigger: Trigger,
    options: TaskOptions,
    handler: Arc<dyn Runnable>,
}

impl TaskDefinitionBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.options.initial_delay = initial_delay;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = enabled;
        self
    }

    pub fn options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> TaskDefinition {
        TaskDefinition {
            name: Arc::from(self.name),
            trigger: self.trigger,
            options: self.options,
            handler: self.handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;

    async fn noop(_ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn builder_defaults() {
        let def = TaskDefinition::builder("noop", Trigger::immediate(), noop).build();
        assert_eq!(def.name(), "noop");
        assert!(def.options().enabled);
        assert!(def.options().timeout.is_none());
        assert_eq!(def.options().initial_delay, Duration::ZERO);
    }

    #[test]
    fn builder_overrides() {
        let def = TaskDefinition::builder("slow", Trigger::parse("1m").unwrap(), noop)
            .timeout(Duration::from_secs(5))
            .initial_delay(Duration::from_secs(2))
            .enabled(false)
            .build();
        assert_eq!(def.options().timeout, Some(Duration::from_secs(5)));
        assert_eq!(def.options().initial_delay, Duration::from_secs(2));
        assert!(!def.options().enabled);
        assert!(format!("{def:?}").contains("slow"));
    }
}
