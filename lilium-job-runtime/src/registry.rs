use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{JobError, Result};
use crate::task::TaskDefinition;

/// Named task definitions, kept in registration order.
///
/// Open for registration until the scheduler starts; read-only afterwards.
#[derive(Debug, Default)]
pub struct Registry {
    tasks: IndexMap<String, Arc<TaskDefinition>>,
    closed: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition; the first definition wins on a name clash
    pub fn register(&mut self, task: TaskDefinition) -> Result<()> {
        if self.closed {
            return Err(JobError::RegistryClosed(task.name().to_string()));
        }
        if self.tasks.contains_key(task.name()) {
            return Err(JobError::DuplicateTask(task.name().to_string()));
        }
        self.tasks.insert(task.name().to_string(), Arc::new(task));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TaskDefinition>> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Definitions in registration order
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.tasks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use crate::trigger::Trigger;
    use std::time::Duration;

    async fn noop(_ctx: JobContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn task(name: &str, trigger: &str) -> TaskDefinition {
        TaskDefinition::builder(name, Trigger::parse(trigger).unwrap(), noop).build()
    }

    #[test]
    fn duplicate_registration_keeps_first_definition() {
        let mut registry = Registry::new();
        registry.register(task("report", "5s")).unwrap();

        let err = registry.register(task("report", "10s")).unwrap_err();
        assert!(matches!(err, JobError::DuplicateTask(ref name) if name == "report"));

        let kept = registry.lookup("report").unwrap();
        match kept.trigger() {
            Trigger::Interval { period } => assert_eq!(*period, Duration::from_secs(5)),
            other => panic!("unexpected trigger {other}"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_unknown_task() {
        let registry = Registry::new();
        assert!(matches!(
            registry.lookup("ghost"),
            Err(JobError::TaskNotFound(_))
        ));
    }

    #[test]
    fn closed_registry_rejects_registration() {
        let mut registry = Registry::new();
        registry.register(task("a", "immediate")).unwrap();
        registry.close();
        assert!(registry.is_closed());
        assert!(matches!(
            registry.register(task("b", "immediate")),
            Err(JobError::RegistryClosed(_))
        ));
        assert!(registry.lookup("a").is_ok());
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut registry = Registry::new();
        for name in ["c", "a", "b"] {
            registry.register(task(name, "1s")).unwrap();
        }
        let names: Vec<_> = registry.tasks().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
