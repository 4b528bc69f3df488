// Store module: connection traits consumed by the engine and the bulk API client

pub mod bulk_api;

pub use bulk_api::BulkApiClient;

use crate::errors::StoreError;
use crate::models::{LoadOptions, LoadOutcome, Operation, Record};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Event pushed by a streaming query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    /// One decoded record
    Record(Record),
    /// Transport or query failure; no further events follow
    Error(StoreError),
    /// Stream exhausted; no further events follow
    End,
}

/// Receiving half of a streaming query
pub type QueryEvents = mpsc::Receiver<QueryEvent>;

/// Polling configuration for asynchronous bulk jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_millis(2_000, 25_000)
    }
}

/// Read side of a remote store
pub trait SourceConnection: Send + Sync {
    /// Start a bulk query and return the stream its events are pushed to.
    ///
    /// The stream yields any number of `Record` events followed by exactly one
    /// `End` or `Error`.
    fn bulk_query(&self, query: &str) -> QueryEvents;
}

/// Write side of a remote store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetConnection: Send + Sync {
    /// Submit a batch and return one outcome per record, in submission order
    async fn bulk_load(
        &self,
        object: &str,
        operation: Operation,
        options: &LoadOptions,
        records: Vec<Record>,
    ) -> Result<Vec<LoadOutcome>, StoreError>;
}
