// Telemetry module for structured logging, metrics, and tracing

use crate::config::LogFormat;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Failure stage label for `dxload_task_errors_total`
pub const STAGE_EXTRACT: &str = "extract";
pub const STAGE_MAP: &str = "map";
pub const STAGE_LOAD: &str = "load";

/// Initialize logging on stderr, leaving stdout to the run result
///
/// The log level comes from `RUST_LOG` when set, otherwise from `log_level`.
/// When `tracing_endpoint` is set spans are also exported over OTLP.
pub fn init_logging(
    log_level: &str,
    log_format: LogFormat,
    tracing_endpoint: Option<&str>,
) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let registry = tracing_subscriber::registry().with(fmt_layer.with_filter(env_filter));

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::debug!(
        log_level = log_level,
        log_format = ?log_format,
        tracing_endpoint = tracing_endpoint,
        "Logging initialized"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "dxload"),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer("dxload");

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");

    Ok(tracer)
}

/// Flush remaining spans; call before the process exits
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize the Prometheus exporter and describe the engine's metrics
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "dxload_records_extracted_total",
        "Records read from the source store"
    );
    describe_counter!(
        "dxload_records_loaded_total",
        "Records the target store accepted"
    );
    describe_counter!(
        "dxload_records_failed_total",
        "Records the target store rejected"
    );
    describe_counter!(
        "dxload_task_errors_total",
        "Task stages that failed as a whole"
    );
    describe_histogram!(
        "dxload_task_duration_seconds",
        "Wall time of one task from extract to summary"
    );

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");

    Ok(())
}

#[inline]
pub fn record_records_extracted(task: &str, count: usize) {
    counter!("dxload_records_extracted_total", "task" => task.to_string()).increment(count as u64);
}

#[inline]
pub fn record_load_outcomes(task: &str, succeeded: usize, failed: usize) {
    counter!("dxload_records_loaded_total", "task" => task.to_string()).increment(succeeded as u64);
    counter!("dxload_records_failed_total", "task" => task.to_string()).increment(failed as u64);
}

#[inline]
pub fn record_task_error(task: &str, stage: &'static str) {
    counter!("dxload_task_errors_total", "task" => task.to_string(), "stage" => stage).increment(1);
}

#[inline]
pub fn record_task_duration(task: &str, duration_seconds: f64) {
    histogram!("dxload_task_duration_seconds", "task" => task.to_string()).record(duration_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        // Without an installed recorder these are no-ops and must not panic
        record_records_extracted("accounts", 10);
        record_load_outcomes("accounts", 8, 2);
        record_task_error("accounts", STAGE_LOAD);
        record_task_duration("accounts", 1.5);
    }
}
