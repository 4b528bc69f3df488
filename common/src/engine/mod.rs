// Engine module: extract → map → load for each task, tasks run in sequence

pub mod extractor;
pub mod loader;
pub mod mapper;
pub mod orchestrator;
pub mod task_runner;

pub use extractor::Extractor;
pub use loader::Loader;
pub use mapper::{FieldMapper, MissingFieldPolicy};
pub use orchestrator::JobOrchestrator;
pub use task_runner::{classify_outcomes, OutcomeTally, TaskRunner};
