//! Daemon configuration (§6, §4.K): built-in defaults, overridden by a
//! `ulsp-daemon.toml` found on `ULSP_CONFIG_DIR`, overridden in turn by
//! `ULSP_*` environment variables.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::DaemonError;

/// Logging encoding selected by [`Config::environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEncoding {
    /// Human-readable, for interactive/local use.
    Pretty,
    /// Line-delimited JSON, for production log aggregation.
    Json,
}

/// Logging settings under the `logging` config key.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"ulsp_daemon=debug"`.
    pub level: String,
    /// Output encoding.
    pub encoding: LogEncoding,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), encoding: LogEncoding::Pretty }
    }
}

/// Runtime configuration for the daemon process.
///
/// Updated only at process start; components that need a subset of it
/// (Document Store's `max_file_size_bytes`, Idle Supervisor's
/// `idle_timeout`) are handed an owned copy or a cheap clone of the field
/// they need rather than the whole struct.
#[derive(Debug, Clone)]
pub struct Config {
    /// Idle Supervisor re-arm interval.
    pub idle_timeout_minutes: u64,
    /// Per-plugin enablement, by plugin name.
    pub ulsp_plugins: HashMap<String, bool>,
    /// Document Store ingestion limit, in bytes.
    pub max_file_size_bytes: u64,
    /// Listen address for the Connection Host, e.g. `"127.0.0.1:0"`.
    pub jsonrpc_address: String,
    /// Path of the JSON file written at startup with live connection
    /// addresses, removed at shutdown. `None` disables the feature.
    pub server_info_file_path: Option<PathBuf>,
    /// Logger settings.
    pub logging: LoggingConfig,
    /// `ULSP_ENVIRONMENT`, defaulting to `"local"`.
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
            ulsp_plugins: HashMap::new(),
            max_file_size_bytes: 10 * 1024 * 1024,
            jsonrpc_address: "127.0.0.1:7657".to_string(),
            server_info_file_path: None,
            logging: LoggingConfig::default(),
            environment: "local".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, then any `ulsp-daemon.toml` found
    /// on `ULSP_CONFIG_DIR` (colon-separated search path, later entries win),
    /// then `ULSP_*` environment variables, then validate.
    pub fn load() -> Result<Self, DaemonError> {
        let mut config = Self::default();

        if let Ok(environment) = env::var("ULSP_ENVIRONMENT") {
            config.environment = environment;
        }

        if let Ok(search_path) = env::var("ULSP_CONFIG_DIR") {
            for dir in search_path.split(':').filter(|s| !s.is_empty()) {
                let candidate = Path::new(dir).join("ulsp-daemon.toml");
                if let Ok(text) = std::fs::read_to_string(&candidate) {
                    config.apply_toml(&text)?;
                }
            }
        }

        config.apply_environment_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), DaemonError> {
        let value: toml::Value = text
            .parse()
            .map_err(|e| DaemonError::ConfigMissing(format!("invalid config TOML: {e}")))?;
        let Some(table) = value.as_table() else {
            return Ok(());
        };

        if let Some(v) = table.get("idleTimeoutMinutes").and_then(toml::Value::as_integer) {
            self.idle_timeout_minutes = v.max(0) as u64;
        }
        if let Some(v) = table.get("maxFileSizeBytes").and_then(toml::Value::as_integer) {
            self.max_file_size_bytes = v.max(0) as u64;
        }
        if let Some(v) = table.get("jsonrpc").and_then(toml::Value::as_table) {
            if let Some(addr) = v.get("address").and_then(toml::Value::as_str) {
                self.jsonrpc_address = addr.to_string();
            }
        }
        if let Some(v) = table.get("serverInfoFilePath").and_then(toml::Value::as_str) {
            self.server_info_file_path = Some(PathBuf::from(v));
        }
        if let Some(plugins) = table.get("ulspPlugins").and_then(toml::Value::as_table) {
            for (name, enabled) in plugins {
                if let Some(enabled) = enabled.as_bool() {
                    self.ulsp_plugins.insert(name.clone(), enabled);
                }
            }
        }
        if let Some(logging) = table.get("logging").and_then(toml::Value::as_table) {
            if let Some(level) = logging.get("level").and_then(toml::Value::as_str) {
                self.logging.level = level.to_string();
            }
            if let Some(encoding) = logging.get("encoding").and_then(toml::Value::as_str) {
                self.logging.encoding = match encoding {
                    "json" => LogEncoding::Json,
                    _ => LogEncoding::Pretty,
                };
            }
        }
        Ok(())
    }

    fn apply_environment_overrides(&mut self) {
        if self.environment != "local" {
            self.logging.encoding = LogEncoding::Json;
        }
        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), DaemonError> {
        if self.idle_timeout_minutes == 0 {
            return Err(DaemonError::ConfigMissing("idleTimeoutMinutes must be positive".into()));
        }
        if self.max_file_size_bytes == 0 {
            return Err(DaemonError::ConfigMissing("maxFileSizeBytes must be positive".into()));
        }
        Ok(())
    }
}
