//! Configuration for the dispatch pipeline.
//!
//! Values come from serde defaults, optionally a JSON file, and finally
//! `GEODISPATCH_*` environment overrides.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `geodispatch=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Configuration for the dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Minimum minutes between two runs of a job, unless the job overrides it.
    #[serde(default = "default_min_interval")]
    pub default_min_interval_minutes: i64,
    /// Execution host recorded when the trigger does not name one.
    #[serde(default = "default_execution_host")]
    pub default_execution_host: String,
    /// Worker task that processes a dispatched job.
    #[serde(default = "default_task_name")]
    pub task_name: String,
    /// Coordinate count above which a job is treated as batch work.
    #[serde(default = "default_batch_threshold")]
    pub batch_coordinate_threshold: usize,
    /// Optional wall-clock bound for one run, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_min_interval() -> i64 {
    5
}

fn default_execution_host() -> String {
    "job-discovery-pipeline".to_string()
}

fn default_task_name() -> String {
    "tasks.job_processor.process_geospatial_job".to_string()
}

fn default_batch_threshold() -> usize {
    100
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_min_interval_minutes: default_min_interval(),
            default_execution_host: default_execution_host(),
            task_name: default_task_name(),
            batch_coordinate_threshold: default_batch_threshold(),
            run_timeout_secs: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON or
    /// `ConfigError::Invalid` if validation fails.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Applies `GEODISPATCH_*` environment overrides from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable holds an unusable value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable holds an unusable value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("GEODISPATCH_MIN_INTERVAL_MINUTES") {
            self.default_min_interval_minutes =
                parse_env("GEODISPATCH_MIN_INTERVAL_MINUTES", &v)?;
        }
        if let Some(v) = lookup("GEODISPATCH_EXECUTION_HOST") {
            self.default_execution_host = v;
        }
        if let Some(v) = lookup("GEODISPATCH_TASK_NAME") {
            self.task_name = v;
        }
        if let Some(v) = lookup("GEODISPATCH_BATCH_COORDINATE_THRESHOLD") {
            self.batch_coordinate_threshold =
                parse_env("GEODISPATCH_BATCH_COORDINATE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("GEODISPATCH_RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = Some(parse_env("GEODISPATCH_RUN_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("GEODISPATCH_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("GEODISPATCH_LOG_FORMAT") {
            self.logging.format = match v.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: "GEODISPATCH_LOG_FORMAT".to_string(),
                        value: v,
                    })
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Sets the default minimum interval.
    #[must_use]
    pub fn with_min_interval_minutes(mut self, minutes: i64) -> Self {
        self.default_min_interval_minutes = minutes;
        self
    }

    /// Sets the default execution host.
    #[must_use]
    pub fn with_execution_host(mut self, host: impl Into<String>) -> Self {
        self.default_execution_host = host.into();
        self
    }

    /// Sets the run timeout.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Returns the run timeout as a `Duration`.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }

    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_min_interval_minutes < 0 {
            return Err(invalid("default_min_interval_minutes", "must not be negative"));
        }
        if self.task_name.trim().is_empty() {
            return Err(invalid("task_name", "must not be empty"));
        }
        if self.default_execution_host.trim().is_empty() {
            return Err(invalid("default_execution_host", "must not be empty"));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(invalid("run_timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.default_min_interval_minutes, 5);
        assert_eq!(config.default_execution_host, "job-discovery-pipeline");
        assert_eq!(config.batch_coordinate_threshold, 100);
        assert!(config.run_timeout().is_none());
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config =
            DispatchConfig::from_json_str(r#"{"default_min_interval_minutes": 15}"#).unwrap();
        assert_eq!(config.default_min_interval_minutes, 15);
        assert_eq!(config.task_name, default_task_name());
    }

    #[test]
    fn test_invalid_json_value_rejected() {
        let err = DispatchConfig::from_json_str(r#"{"task_name": "  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"run_timeout_secs": 30, "logging": {{"level": "debug", "format": "pretty"}}}}"#
        )
        .unwrap();

        let config = DispatchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.run_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_file() {
        let err = DispatchConfig::from_file("/nonexistent/geodispatch.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("GEODISPATCH_MIN_INTERVAL_MINUTES", "10"),
            ("GEODISPATCH_EXECUTION_HOST", "worker-3"),
            ("GEODISPATCH_LOG_FORMAT", "PRETTY"),
        ]
        .into_iter()
        .collect();

        let config = DispatchConfig::default()
            .with_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.default_min_interval_minutes, 10);
        assert_eq!(config.default_execution_host, "worker-3");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_bad_override_rejected() {
        let err = DispatchConfig::default()
            .with_overrides(|k| (k == "GEODISPATCH_RUN_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));

        let err = DispatchConfig::default()
            .with_overrides(|k| (k == "GEODISPATCH_RUN_TIMEOUT_SECS").then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
