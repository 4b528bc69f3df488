// Loader - submits one batch of records to the target store

use crate::errors::LoadError;
use crate::models::{ConcurrencyMode, LoadOptions, LoadOutcome, Operation, Record, Task};
use crate::store::TargetConnection;
use tracing::{info, instrument};

/// Loader dispatches batches with a single run-wide concurrency mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Loader {
    concurrency_mode: ConcurrencyMode,
}

impl Loader {
    pub fn new(concurrency_mode: ConcurrencyMode) -> Self {
        Self { concurrency_mode }
    }

    /// Options for loading `task`'s records
    pub fn options_for(&self, task: &Task) -> LoadOptions {
        LoadOptions::for_task(task, self.concurrency_mode)
    }

    /// Submit `records` and return one outcome per record, in input order.
    ///
    /// Callers skip empty batches; an empty batch is rejected here without
    /// contacting the target.
    #[instrument(skip(self, options, records, target), fields(record_count = records.len()))]
    pub async fn load(
        &self,
        object: &str,
        operation: Operation,
        options: &LoadOptions,
        records: Vec<Record>,
        target: &dyn TargetConnection,
    ) -> Result<Vec<LoadOutcome>, LoadError> {
        if records.is_empty() {
            return Err(LoadError::EmptyBatch);
        }

        let submitted = records.len();
        let outcomes = target.bulk_load(object, operation, options, records).await?;

        if outcomes.len() != submitted {
            return Err(LoadError::OutcomeCountMismatch {
                submitted,
                received: outcomes.len(),
            });
        }

        info!(submitted, "Batch load settled");
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::MockTargetConnection;
    use serde_json::json;

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| json!({"Name": format!("r{}", i)}).as_object().cloned().unwrap())
            .collect()
    }

    fn options() -> LoadOptions {
        LoadOptions {
            concurrency_mode: ConcurrencyMode::Serial,
            external_id_field: None,
        }
    }

    #[tokio::test]
    async fn test_returns_outcomes_from_target() {
        let mut target = MockTargetConnection::new();
        target
            .expect_bulk_load()
            .withf(|object, operation, _, records| {
                object == "Account" && *operation == Operation::Insert && records.len() == 2
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(vec![LoadOutcome::succeeded("001"), LoadOutcome::failed(["DUPLICATE"])])
            });

        let outcomes = Loader::default()
            .load("Account", Operation::Insert, &options(), records(2), &target)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].errors, vec!["DUPLICATE".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batch_never_reaches_target() {
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().never();

        let err = Loader::default()
            .load("Account", Operation::Insert, &options(), Vec::new(), &target)
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::EmptyBatch);
    }

    #[tokio::test]
    async fn test_store_failure_becomes_load_error() {
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().returning(|_, _, _, _| {
            Err(StoreError::Http {
                status: 401,
                body: "INVALID_SESSION_ID".to_string(),
            })
        });

        let err = Loader::default()
            .load("Account", Operation::Update, &options(), records(1), &target)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Submission(StoreError::Http { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_outcome_count_mismatch_is_load_error() {
        let mut target = MockTargetConnection::new();
        target
            .expect_bulk_load()
            .returning(|_, _, _, _| Ok(vec![LoadOutcome::succeeded("001")]));

        let err = Loader::default()
            .load("Account", Operation::Insert, &options(), records(3), &target)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LoadError::OutcomeCountMismatch {
                submitted: 3,
                received: 1
            }
        );
    }

    #[test]
    fn test_options_follow_task_operation() {
        let loader = Loader::new(ConcurrencyMode::Parallel);
        let mut task = Task {
            name: "accounts".to_string(),
            query: "SELECT Id FROM Account".to_string(),
            operation: Operation::Upsert,
            object: "Account".to_string(),
            external_id: Some("Ext__c".to_string()),
            sequence: None,
            map: None,
        };
        assert_eq!(loader.options_for(&task).external_id_field.as_deref(), Some("Ext__c"));
        assert_eq!(loader.options_for(&task).concurrency_mode, ConcurrencyMode::Parallel);

        task.operation = Operation::Delete;
        assert_eq!(loader.options_for(&task).external_id_field, None);
    }
}
