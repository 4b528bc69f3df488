use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Records
// ============================================================================

/// A single record as returned by the source store: field name to value
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Source field name to target field name
pub type FieldMap = BTreeMap<String, String>;

// ============================================================================
// Task Models
// ============================================================================

/// Write semantics applied to a batch at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }

    /// Only upserts match existing records through an external id field
    pub fn requires_external_id(&self) -> bool {
        matches!(self, Operation::Upsert)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Task is one declared unit of work: query the source, remap, load the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    pub query: String,
    pub operation: Operation,
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<FieldMap>,
}

// ============================================================================
// Load Models
// ============================================================================

/// How the target store parallelizes the internal sub-batches of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    #[default]
    #[serde(alias = "serial")]
    Serial,
    #[serde(alias = "parallel")]
    Parallel,
}

/// Options handed to the target store alongside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    pub concurrency_mode: ConcurrencyMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id_field: Option<String>,
}

impl LoadOptions {
    /// Build options for a task; the external id travels only with upserts
    pub fn for_task(task: &Task, concurrency_mode: ConcurrencyMode) -> Self {
        let external_id_field = if task.operation.requires_external_id() {
            task.external_id.clone()
        } else {
            None
        };

        Self {
            concurrency_mode,
            external_id_field,
        }
    }
}

/// Per-record result of a batch load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl LoadOutcome {
    pub fn succeeded(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn failed<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: None,
            success: false,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Summary Models
// ============================================================================

/// Delimiter joining the error messages of one failed record
pub const FAILED_MESSAGE_DELIMITER: &str = "|";

/// Aggregated report of one task execution
///
/// `success_count` and `failed_record_messages` are `None` when a load was
/// needed but produced no outcomes (the batch was rejected as a whole or the
/// mapping stage failed). They are `Some` with zero values when there was
/// nothing to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task: String,
    pub object: String,
    pub operation: Operation,
    pub query_result_count: usize,
    pub query_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping_errors: Vec<String>,
    pub load_errors: Vec<String>,
    pub success_count: Option<usize>,
    pub failed_record_messages: Option<Vec<String>>,
}

impl TaskSummary {
    /// Start an empty summary for a task; every accumulator begins empty
    pub fn new(task: &Task) -> Self {
        Self {
            task: task.name.clone(),
            object: task.object.clone(),
            operation: task.operation,
            query_result_count: 0,
            query_errors: Vec::new(),
            mapping_errors: Vec::new(),
            load_errors: Vec::new(),
            success_count: Some(0),
            failed_record_messages: Some(Vec::new()),
        }
    }

    pub fn failed_count(&self) -> Option<usize> {
        self.failed_record_messages.as_ref().map(Vec::len)
    }

    /// True when any stage reported an error or any record failed
    pub fn has_errors(&self) -> bool {
        !self.query_errors.is_empty()
            || !self.mapping_errors.is_empty()
            || !self.load_errors.is_empty()
            || self.failed_count().unwrap_or(0) > 0
    }
}

/// Result of a whole run: one summary per task, in task order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summaries: Vec<TaskSummary>,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        self.summaries.iter().any(TaskSummary::has_errors)
    }

    pub fn total_success(&self) -> usize {
        self.summaries
            .iter()
            .filter_map(|summary| summary.success_count)
            .sum()
    }

    pub fn total_failed(&self) -> usize {
        self.summaries
            .iter()
            .filter_map(TaskSummary::failed_count)
            .sum()
    }
}
