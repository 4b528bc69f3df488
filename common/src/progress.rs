// Progress reporting sinks for human-readable task progress

use crate::models::{Task, TaskSummary};
use chrono::Local;
use std::io::Write;
use std::sync::Mutex;

/// One-way sink for per-task progress lines and warnings
pub trait ProgressReporter: Send + Sync {
    /// A task is about to start extracting
    fn task_started(&self, task: &Task);

    /// A stage of `task` produced a progress line
    fn progress(&self, task: &Task, line: &str);

    /// A task produced its summary
    fn task_finished(&self, summary: &TaskSummary);

    /// A warning not tied to a single task
    fn warn(&self, message: &str);
}

/// Writes timestamped progress lines, to stderr unless another writer is given
pub struct ConsoleReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    fn write_line(&self, line: &str) {
        // A poisoned lock only means another writer panicked mid-line
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(out, "[{}]:{}", Local::now().format("%H:%M:%S"), line);
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleReporter {
    fn task_started(&self, task: &Task) {
        self.write_line(&format!("[{}][{}] starting", task.name, task.object));
    }

    fn progress(&self, task: &Task, line: &str) {
        self.write_line(&format!("[{}][{}]:[{}] {}", task.name, task.object, task.operation, line));
    }

    fn task_finished(&self, summary: &TaskSummary) {
        let status = if summary.has_errors() { "finished with errors" } else { "done" };
        self.write_line(&format!("[{}][{}] {}", summary.task, summary.object, status));
    }

    fn warn(&self, message: &str) {
        self.write_line(&format!("WARNING: {}", message));
    }
}

/// Routes progress into structured logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn task_started(&self, task: &Task) {
        tracing::info!(task = %task.name, object = %task.object, operation = %task.operation, "Task started");
    }

    fn progress(&self, task: &Task, line: &str) {
        tracing::info!(task = %task.name, object = %task.object, "{}", line);
    }

    fn task_finished(&self, summary: &TaskSummary) {
        tracing::info!(
            task = %summary.task,
            query_result_count = summary.query_result_count,
            success_count = ?summary.success_count,
            failed_count = ?summary.failed_count(),
            has_errors = summary.has_errors(),
            "Task finished"
        );
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}
