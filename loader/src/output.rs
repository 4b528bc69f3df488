// Run result presentation: JSON envelope and console table

use common::models::{RunResult, TaskSummary};
use serde_json::{json, Value};
use std::fmt::Write;

/// `{"status": 0, "result": [summaries]}`
pub fn json_envelope(result: &RunResult) -> Value {
    json!({
        "status": 0,
        "result": result.summaries,
    })
}

fn count(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn first_error(summary: &TaskSummary) -> Option<&str> {
    summary
        .query_errors
        .iter()
        .chain(&summary.mapping_errors)
        .chain(&summary.load_errors)
        .map(String::as_str)
        .next()
}

/// One line per task followed by failed record messages
pub fn render_table(result: &RunResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<24} {:<8} {:>8} {:>8} {:>8}",
        "TASK", "OBJECT", "OP", "QUERIED", "OK", "FAILED"
    );

    for summary in &result.summaries {
        let _ = writeln!(
            out,
            "{:<24} {:<24} {:<8} {:>8} {:>8} {:>8}",
            summary.task,
            summary.object,
            summary.operation,
            summary.query_result_count,
            count(summary.success_count),
            count(summary.failed_count()),
        );
        if let Some(error) = first_error(summary) {
            let _ = writeln!(out, "  error: {}", error);
        }
        for message in summary.failed_record_messages.iter().flatten() {
            let _ = writeln!(out, "  failed: {}", message);
        }
    }

    let _ = writeln!(
        out,
        "\n{} task(s), {} record(s) succeeded, {} record(s) failed",
        result.summaries.len(),
        result.total_success(),
        result.total_failed()
    );
    out
}
