// Error handling framework for the extract/map/load engine

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a remote store client (source or target side)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Store responded with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Bulk job {job_id} ended in state {state}: {message}")]
    JobFailed {
        job_id: String,
        state: String,
        message: String,
    },

    #[error("Bulk job {job_id} did not complete within {timeout_ms} ms")]
    PollTimeout { job_id: String, timeout_ms: u64 },

    #[error("Invalid store response: {0}")]
    InvalidResponse(String),
}

/// Source-side failure while streaming query results
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Bulk query failed: {0}")]
    Query(#[from] StoreError),

    #[error("Bulk query did not settle within {0:?}")]
    Timeout(Duration),

    #[error("Query event stream closed before completion")]
    StreamClosed,
}

/// Target-side failure that rejects a whole batch submission
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Bulk load failed: {0}")]
    Submission(#[from] StoreError),

    #[error("Bulk load returned {received} outcomes for {submitted} records")]
    OutcomeCountMismatch { submitted: usize, received: usize },

    #[error("Refusing to submit an empty batch")]
    EmptyBatch,
}

/// Field mapping errors (only raised under the `error` missing-field policy)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Record {index} is missing mapped source field '{field}'")]
    MissingField { index: usize, field: String },
}

/// Settings and task-file errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Failed to read task file {path}: {reason}")]
    TaskFileRead { path: String, reason: String },

    #[error("Invalid task file: {0}")]
    TaskFileParse(#[from] serde_yaml::Error),

    #[error("Invalid task '{task}': {reason}")]
    InvalidTask { task: String, reason: String },

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Unknown connection alias: {0}")]
    UnknownConnection(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

impl ConfigurationError {
    pub fn invalid_task(task: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidTask {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::InvalidResponse(err.to_string())
        } else {
            StoreError::RequestFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_wraps_store_error() {
        let err: ExtractionError = StoreError::PollTimeout {
            job_id: "750x".to_string(),
            timeout_ms: 25000,
        }
        .into();
        assert!(err.to_string().contains("25000 ms"));
        assert!(err.to_string().starts_with("Bulk query failed"));
    }

    #[test]
    fn test_load_error_count_mismatch_display() {
        let err = LoadError::OutcomeCountMismatch {
            submitted: 3,
            received: 2,
        };
        assert_eq!(err.to_string(), "Bulk load returned 2 outcomes for 3 records");
    }

    #[test]
    fn test_invalid_task_helper() {
        let err = ConfigurationError::invalid_task("accounts", "query is empty");
        assert_eq!(err.to_string(), "Invalid task 'accounts': query is empty");
    }
}
