// Task runner - executes one task end to end and always yields a summary

use crate::config::Settings;
use crate::engine::{Extractor, FieldMapper, Loader};
use crate::models::{LoadOutcome, Task, TaskSummary, FAILED_MESSAGE_DELIMITER};
use crate::progress::ProgressReporter;
use crate::store::{SourceConnection, TargetConnection};
use crate::telemetry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Success count and per-record failure messages of one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeTally {
    pub success_count: usize,
    pub failed_record_messages: Vec<String>,
}

/// Count successes and join each failed record's errors, in outcome order
pub fn classify_outcomes(outcomes: &[LoadOutcome]) -> OutcomeTally {
    let success_count = outcomes.iter().filter(|outcome| outcome.success).count();
    let failed_record_messages = outcomes
        .iter()
        .filter(|outcome| !outcome.success)
        .map(|outcome| outcome.errors.join(FAILED_MESSAGE_DELIMITER))
        .collect();

    OutcomeTally {
        success_count,
        failed_record_messages,
    }
}

/// TaskRunner wires the extractor, mapper and loader for a single task
pub struct TaskRunner {
    extractor: Extractor,
    mapper: FieldMapper,
    loader: Loader,
    reporter: Arc<dyn ProgressReporter>,
}

impl TaskRunner {
    pub fn new(
        extractor: Extractor,
        mapper: FieldMapper,
        loader: Loader,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            extractor,
            mapper,
            loader,
            reporter,
        }
    }

    /// Build a runner from the bulk and mapping settings
    pub fn from_settings(settings: &Settings, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self::new(
            Extractor::new(settings.bulk.extract_timeout()),
            FieldMapper::new(settings.mapping.missing_field),
            Loader::new(settings.bulk.concurrency_mode),
            reporter,
        )
    }

    pub fn reporter(&self) -> &Arc<dyn ProgressReporter> {
        &self.reporter
    }

    /// Run `task`; extraction and load failures are captured in the summary
    #[instrument(skip_all, fields(task = %task.name, object = %task.object, operation = %task.operation))]
    pub async fn run(
        &self,
        task: &Task,
        source: &dyn SourceConnection,
        target: &dyn TargetConnection,
    ) -> TaskSummary {
        let started = Instant::now();
        self.reporter.task_started(task);

        let summary = self.execute(task, source, target).await;

        telemetry::record_task_duration(&task.name, started.elapsed().as_secs_f64());
        self.reporter.task_finished(&summary);
        summary
    }

    async fn execute(
        &self,
        task: &Task,
        source: &dyn SourceConnection,
        target: &dyn TargetConnection,
    ) -> TaskSummary {
        let mut summary = TaskSummary::new(task);

        let records = match self.extractor.extract(&task.query, source).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Extraction failed, skipping load");
                telemetry::record_task_error(&task.name, telemetry::STAGE_EXTRACT);
                self.reporter.progress(task, &format!("query failed: {}", e));
                summary.query_errors.push(e.to_string());
                return summary;
            }
        };

        summary.query_result_count = records.len();
        telemetry::record_records_extracted(&task.name, records.len());
        self.reporter
            .progress(task, &format!("{} records fetched.", records.len()));

        if records.is_empty() {
            info!("Nothing to load");
            return summary;
        }

        let mapped = match self.mapper.remap(task.map.as_ref(), records) {
            Ok(mapped) => mapped,
            Err(e) => {
                warn!(error = %e, "Field mapping failed, skipping load");
                telemetry::record_task_error(&task.name, telemetry::STAGE_MAP);
                self.reporter.progress(task, &format!("mapping failed: {}", e));
                summary.mapping_errors.push(e.to_string());
                summary.success_count = None;
                summary.failed_record_messages = None;
                return summary;
            }
        };

        let options = self.loader.options_for(task);
        match self
            .loader
            .load(&task.object, task.operation, &options, mapped, target)
            .await
        {
            Ok(outcomes) => {
                let tally = classify_outcomes(&outcomes);
                let failed = tally.failed_record_messages.len();
                telemetry::record_load_outcomes(&task.name, tally.success_count, failed);
                self.reporter.progress(
                    task,
                    &format!(
                        "{} record(s) have been successfully processed. | {} record(s) have been failed.",
                        tally.success_count, failed
                    ),
                );
                summary.success_count = Some(tally.success_count);
                summary.failed_record_messages = Some(tally.failed_record_messages);
            }
            Err(e) => {
                error!(error = %e, "Load failed");
                telemetry::record_task_error(&task.name, telemetry::STAGE_LOAD);
                self.reporter.progress(task, &format!("load failed: {}", e));
                summary.load_errors.push(e.to_string());
                summary.success_count = None;
                summary.failed_record_messages = None;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MissingFieldPolicy;
    use crate::errors::StoreError;
    use crate::models::{ConcurrencyMode, Operation, Record};
    use crate::store::{MockTargetConnection, QueryEvent, QueryEvents};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ScriptedSource {
        events: Vec<QueryEvent>,
    }

    impl SourceConnection for ScriptedSource {
        fn bulk_query(&self, _query: &str) -> QueryEvents {
            let (tx, rx) = mpsc::channel(self.events.len().max(1));
            for event in self.events.clone() {
                let _ = tx.try_send(event);
            }
            rx
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        lines: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn task_started(&self, task: &Task) {
            self.lines.lock().unwrap().push(format!("start {}", task.name));
        }

        fn progress(&self, _task: &Task, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }

        fn task_finished(&self, summary: &TaskSummary) {
            self.lines.lock().unwrap().push(format!("finish {}", summary.task));
        }

        fn warn(&self, message: &str) {
            self.lines.lock().unwrap().push(format!("warn {}", message));
        }
    }

    fn task(operation: Operation) -> Task {
        Task {
            name: "accounts".to_string(),
            query: "SELECT Id, Name FROM Account".to_string(),
            operation,
            object: "Account".to_string(),
            external_id: Some("Legacy_Id__c".to_string()),
            sequence: None,
            map: None,
        }
    }

    fn records(count: usize) -> Vec<QueryEvent> {
        let mut events: Vec<QueryEvent> = (0..count)
            .map(|i| QueryEvent::Record(json!({"Id": i, "Name": format!("n{}", i)}).as_object().cloned().unwrap()))
            .collect();
        events.push(QueryEvent::End);
        events
    }

    fn runner(reporter: Arc<RecordingReporter>) -> TaskRunner {
        TaskRunner::new(
            Extractor::new(Duration::from_secs(1)),
            FieldMapper::default(),
            Loader::new(ConcurrencyMode::Serial),
            reporter,
        )
    }

    #[test]
    fn test_classify_outcomes_joins_messages() {
        let outcomes = vec![
            LoadOutcome::succeeded("1"),
            LoadOutcome::failed(["E1"]),
            LoadOutcome::succeeded("3"),
            LoadOutcome::failed(["E2", "E3"]),
        ];
        let tally = classify_outcomes(&outcomes);
        assert_eq!(tally.success_count, 2);
        assert_eq!(tally.failed_record_messages, vec!["E1".to_string(), "E2|E3".to_string()]);
    }

    #[tokio::test]
    async fn test_partial_failures_are_aggregated() {
        let reporter = Arc::new(RecordingReporter::default());
        let source = ScriptedSource { events: records(4) };
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().times(1).returning(|_, _, _, _| {
            Ok(vec![
                LoadOutcome::succeeded("1"),
                LoadOutcome::failed(["E1"]),
                LoadOutcome::succeeded("3"),
                LoadOutcome::failed(["E2", "E3"]),
            ])
        });

        let summary = runner(reporter.clone())
            .run(&task(Operation::Insert), &source, &target)
            .await;

        assert_eq!(summary.query_result_count, 4);
        assert_eq!(summary.success_count, Some(2));
        assert_eq!(
            summary.failed_record_messages,
            Some(vec!["E1".to_string(), "E2|E3".to_string()])
        );
        assert!(summary.query_errors.is_empty());
        assert!(summary.load_errors.is_empty());

        let lines = reporter.lines.lock().unwrap().clone();
        assert_eq!(lines.first().map(String::as_str), Some("start accounts"));
        assert!(lines.contains(&"4 records fetched.".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("2 record(s) have been successfully processed. | 2")));
        assert_eq!(lines.last().map(String::as_str), Some("finish accounts"));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_load() {
        let source = ScriptedSource {
            events: vec![
                QueryEvent::Record(Record::new()),
                QueryEvent::Error(StoreError::JobFailed {
                    job_id: "750x".to_string(),
                    state: "Failed".to_string(),
                    message: "INVALID_FIELD".to_string(),
                }),
            ],
        };
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().never();

        let summary = runner(Arc::new(RecordingReporter::default()))
            .run(&task(Operation::Insert), &source, &target)
            .await;

        assert_eq!(summary.query_result_count, 0);
        assert_eq!(summary.query_errors.len(), 1);
        assert!(summary.query_errors[0].contains("INVALID_FIELD"));
        assert_eq!(summary.success_count, Some(0));
        assert_eq!(summary.failed_record_messages, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_empty_extraction_skips_load() {
        let source = ScriptedSource { events: records(0) };
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().never();

        let summary = runner(Arc::new(RecordingReporter::default()))
            .run(&task(Operation::Insert), &source, &target)
            .await;

        assert_eq!(summary.query_result_count, 0);
        assert_eq!(summary.success_count, Some(0));
        assert!(!summary.has_errors());
    }

    #[tokio::test]
    async fn test_load_error_keeps_query_count() {
        let source = ScriptedSource { events: records(3) };
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().times(1).returning(|_, _, _, _| {
            Err(StoreError::Http {
                status: 500,
                body: "UNKNOWN_EXCEPTION".to_string(),
            })
        });

        let summary = runner(Arc::new(RecordingReporter::default()))
            .run(&task(Operation::Update), &source, &target)
            .await;

        assert_eq!(summary.query_result_count, 3);
        assert_eq!(summary.load_errors.len(), 1);
        assert_eq!(summary.success_count, None);
        assert_eq!(summary.failed_record_messages, None);
    }

    #[tokio::test]
    async fn test_upsert_passes_external_id() {
        let source = ScriptedSource { events: records(1) };
        let mut target = MockTargetConnection::new();
        target
            .expect_bulk_load()
            .withf(|object, operation, options, _| {
                object == "Account"
                    && *operation == Operation::Upsert
                    && options.external_id_field.as_deref() == Some("Legacy_Id__c")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec![LoadOutcome::succeeded("1")]));

        let summary = runner(Arc::new(RecordingReporter::default()))
            .run(&task(Operation::Upsert), &source, &target)
            .await;
        assert_eq!(summary.success_count, Some(1));
    }

    #[tokio::test]
    async fn test_insert_omits_external_id() {
        let source = ScriptedSource { events: records(1) };
        let mut target = MockTargetConnection::new();
        target
            .expect_bulk_load()
            .withf(|_, _, options, _| options.external_id_field.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(vec![LoadOutcome::succeeded("1")]));

        runner(Arc::new(RecordingReporter::default()))
            .run(&task(Operation::Insert), &source, &target)
            .await;
    }

    #[tokio::test]
    async fn test_mapped_records_reach_target() {
        let source = ScriptedSource { events: records(2) };
        let mut target = MockTargetConnection::new();
        target
            .expect_bulk_load()
            .withf(|_, _, _, records| {
                records.len() == 2
                    && records[0].get("Legacy_Id__c") == Some(&json!(0))
                    && records[1].get("Legacy_Id__c") == Some(&json!(1))
                    && records.iter().all(|r| r.len() == 1)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec![LoadOutcome::succeeded("a"), LoadOutcome::succeeded("b")]));

        let mut task = task(Operation::Insert);
        task.map = Some([("Id".to_string(), "Legacy_Id__c".to_string())].into_iter().collect());

        let summary = runner(Arc::new(RecordingReporter::default()))
            .run(&task, &source, &target)
            .await;
        assert_eq!(summary.success_count, Some(2));
    }

    #[tokio::test]
    async fn test_mapping_error_skips_load() {
        let source = ScriptedSource { events: records(2) };
        let mut target = MockTargetConnection::new();
        target.expect_bulk_load().never();

        let mut task = task(Operation::Insert);
        task.map = Some([("Phone".to_string(), "Phone".to_string())].into_iter().collect());

        let runner = TaskRunner::new(
            Extractor::new(Duration::from_secs(1)),
            FieldMapper::new(MissingFieldPolicy::Error),
            Loader::default(),
            Arc::new(RecordingReporter::default()),
        );
        let summary = runner.run(&task, &source, &target).await;

        assert_eq!(summary.query_result_count, 2);
        assert_eq!(summary.mapping_errors.len(), 1);
        assert_eq!(summary.success_count, None);
        assert!(summary.has_errors());
    }
}
