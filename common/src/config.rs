// Configuration management with layered configuration (defaults, file, env)

use crate::engine::MissingFieldPolicy;
use crate::errors::ConfigurationError;
use crate::models::ConcurrencyMode;
use crate::store::PollSettings;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store connections by alias
    pub connections: HashMap<String, ConnectionConfig>,
    pub bulk: BulkConfig,
    pub mapping: MappingConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub instance_url: String,
    pub access_token: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "58.0".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub concurrency_mode: ConcurrencyMode,
    pub request_timeout_seconds: u64,
}

impl BulkConfig {
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::from_millis(self.poll_interval_ms, self.poll_timeout_ms)
    }

    /// Longest silence the extractor tolerates between query events: the job
    /// poll timeout plus one results request
    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
            + Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            poll_timeout_ms: 25_000,
            concurrency_mode: ConcurrencyMode::Serial,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub missing_field: MissingFieldPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_port: Option<u16>,
    pub tracing_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_port: None,
            tracing_endpoint: None,
        }
    }
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    /// Load configuration from a specific directory
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("dxload.toml")).required(false))
            // Local overrides (not committed to git)
            .add_source(File::from(config_dir.join("dxload.local.toml")).required(false))
            .add_source(
                Environment::with_prefix("DXLOAD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Look up a connection by alias (aliases are matched case-insensitively)
    pub fn connection(&self, alias: &str) -> Result<&ConnectionConfig, ConfigurationError> {
        self.connections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, connection)| connection)
            .ok_or_else(|| ConfigurationError::UnknownConnection(alias.to_string()))
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bulk.poll_interval_ms == 0 {
            return Err(ConfigurationError::InvalidSettings(
                "bulk.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.bulk.poll_timeout_ms < self.bulk.poll_interval_ms {
            return Err(ConfigurationError::InvalidSettings(
                "bulk.poll_timeout_ms must not be shorter than bulk.poll_interval_ms".to_string(),
            ));
        }
        if self.bulk.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidSettings(
                "bulk.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (alias, connection) in &self.connections {
            if !connection.instance_url.starts_with("http://")
                && !connection.instance_url.starts_with("https://")
            {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "connection '{}' instance_url must be an http(s) URL",
                    alias
                )));
            }
            if connection.access_token.is_empty() {
                return Err(ConfigurationError::InvalidSettings(format!(
                    "connection '{}' access_token cannot be empty",
                    alias
                )));
            }
        }

        Ok(())
    }
}
