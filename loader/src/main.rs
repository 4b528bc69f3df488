// dxload binary entry point: run load tasks between a source and a target store

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use common::config::Settings;
use common::engine::{JobOrchestrator, TaskRunner};
use common::job_config::{JobConfig, DEFAULT_TASK_FILE};
use common::progress::{ConsoleReporter, ProgressReporter, TracingReporter};
use common::store::BulkApiClient;
use common::telemetry;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "dxload")]
#[command(about = "Extract records from a source store and load them into a target store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tasks declared in the task file
    Start(StartArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Connection alias of the store records are loaded into
    #[arg(short = 'u', long = "targetusername", visible_alias = "target")]
    target: String,

    /// Connection alias of the store records are extracted from
    #[arg(short = 's', long = "sourceusername", visible_alias = "source")]
    source: String,

    /// Task file path, relative to the project directory
    #[arg(short = 'p', long = "configpath", visible_alias = "config-path", default_value = DEFAULT_TASK_FILE)]
    config_path: PathBuf,

    /// Project directory the task file is resolved against
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,

    /// Only run these tasks (comma separated)
    #[arg(short = 't', long = "taskname", visible_alias = "task", value_delimiter = ',')]
    task_names: Option<Vec<String>>,

    /// Print the run result as a JSON envelope
    #[arg(long)]
    json: bool,

    /// Send progress to the log instead of the console
    #[arg(long)]
    quiet: bool,

    /// Directory holding dxload.toml / dxload.local.toml
    #[arg(long, visible_alias = "settings", default_value = ".")]
    settings_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start(args) => start(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let settings = Settings::load_from_path(&args.settings_dir)
        .with_context(|| format!("Failed to load settings from {}", args.settings_dir.display()))?;
    settings.validate()?;

    let observability = &settings.observability;
    telemetry::init_logging(
        &observability.log_level,
        observability.log_format,
        observability.tracing_endpoint.as_deref(),
    )?;
    if let Some(port) = observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    let task_file = args.project_dir.join(&args.config_path);
    let job_config = JobConfig::load(&task_file)?;

    let reporter: Arc<dyn ProgressReporter> = if args.quiet {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    };

    let selection = job_config.select(args.task_names.as_deref());
    for name in &selection.unknown {
        reporter.warn(&format!("Task '{}' is not declared in {}", name, task_file.display()));
    }

    let source = BulkApiClient::new(settings.connection(&args.source)?, &settings.bulk)
        .context("Failed to create source connection")?;
    let target = BulkApiClient::new(settings.connection(&args.target)?, &settings.bulk)
        .context("Failed to create target connection")?;

    info!(
        source = %args.source,
        target = %args.target,
        task_count = selection.tasks.len(),
        "Starting load run"
    );

    let orchestrator = JobOrchestrator::new(TaskRunner::from_settings(&settings, reporter));
    let result = orchestrator.run(&selection.tasks, &source, &target).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output::json_envelope(&result))?);
    } else {
        print!("{}", output::render_table(&result));
    }

    if observability.tracing_endpoint.is_some() {
        telemetry::shutdown_tracer();
    }

    Ok(())
}
