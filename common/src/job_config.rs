// Task file loading and task selection
// The task file is YAML with a top-level `tasks` list.

use crate::errors::ConfigurationError;
use crate::models::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// Default task file name, resolved relative to the project directory
pub const DEFAULT_TASK_FILE: &str = "dxloader-config.yaml";

/// Parsed task file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Tasks chosen for a run plus requested names that matched nothing
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSelection {
    pub tasks: Vec<Task>,
    pub unknown: Vec<String>,
}

impl JobConfig {
    /// Read and validate a task file
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigurationError::TaskFileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let job_config = Self::from_yaml_str(&content)?;
        debug!(task_count = job_config.tasks.len(), "Task file loaded");
        Ok(job_config)
    }

    /// Parse and validate task file content
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigurationError> {
        let job_config: JobConfig = serde_yaml::from_str(content)?;
        job_config.validate()?;
        Ok(job_config)
    }

    /// Check task names are unique and every task is loadable as declared
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut names = HashSet::new();

        for task in &self.tasks {
            if task.name.trim().is_empty() {
                return Err(ConfigurationError::invalid_task("<unnamed>", "name is empty"));
            }
            if !names.insert(task.name.as_str()) {
                return Err(ConfigurationError::DuplicateTask(task.name.clone()));
            }
            if task.query.trim().is_empty() {
                return Err(ConfigurationError::invalid_task(&task.name, "query is empty"));
            }
            if task.object.trim().is_empty() {
                return Err(ConfigurationError::invalid_task(&task.name, "object is empty"));
            }
            if task.operation.requires_external_id()
                && task.external_id.as_deref().map_or(true, |id| id.trim().is_empty())
            {
                return Err(ConfigurationError::invalid_task(
                    &task.name,
                    "upsert requires externalId",
                ));
            }
            if let Some(map) = &task.map {
                let mut targets = HashSet::new();
                for target in map.values() {
                    if !targets.insert(target.as_str()) {
                        return Err(ConfigurationError::invalid_task(
                            &task.name,
                            format!("map assigns target field '{}' more than once", target),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Filter tasks by an optional name allow-list, keeping file order.
    ///
    /// Requested names are trimmed and blank entries ignored, so `"a, b"` split
    /// on commas selects `a` and `b`.
    pub fn select(&self, names: Option<&[String]>) -> TaskSelection {
        let Some(names) = names else {
            return TaskSelection {
                tasks: self.tasks.clone(),
                unknown: Vec::new(),
            };
        };

        let names: Vec<&str> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();

        let tasks = self
            .tasks
            .iter()
            .filter(|task| names.contains(&task.name.as_str()))
            .cloned()
            .collect();

        let unknown = names
            .iter()
            .filter(|name| !self.tasks.iter().any(|task| task.name == **name))
            .map(|name| name.to_string())
            .collect();

        TaskSelection { tasks, unknown }
    }
}
