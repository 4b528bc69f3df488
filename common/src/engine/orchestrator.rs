// Job orchestrator - runs the selected tasks one after another

use crate::engine::TaskRunner;
use crate::models::{RunResult, Task};
use crate::store::{SourceConnection, TargetConnection};
use chrono::Utc;
use tracing::{info, instrument, Span};
use uuid::Uuid;

/// JobOrchestrator owns the summary list of a run.
///
/// Tasks may depend on each other's load order (parent objects before
/// children), so a task starts only after the previous one has its summary.
pub struct JobOrchestrator {
    runner: TaskRunner,
}

impl JobOrchestrator {
    pub fn new(runner: TaskRunner) -> Self {
        Self { runner }
    }

    #[instrument(skip_all, fields(run_id = tracing::field::Empty, task_count = tasks.len()))]
    pub async fn run(
        &self,
        tasks: &[Task],
        source: &dyn SourceConnection,
        target: &dyn TargetConnection,
    ) -> RunResult {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();

        if tasks.is_empty() {
            self.runner.reporter().warn("No tasks selected, nothing to run");
        }

        let mut summaries = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            info!(task_index = index, task = %task.name, "Running task");
            summaries.push(self.runner.run(task, source, target).await);
        }

        let result = RunResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            summaries,
        };

        info!(
            total_success = result.total_success(),
            total_failed = result.total_failed(),
            has_errors = result.has_errors(),
            "Run complete"
        );

        result
    }
}
