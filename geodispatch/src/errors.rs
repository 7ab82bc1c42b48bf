//! Error types for the dispatch pipeline.
//!
//! Per-job problems never surface as these errors past the stage that hit
//! them; they are recorded as strings on the pipeline context instead. The
//! types here describe infrastructure failures (repository, broker, graph
//! definition) that may legitimately abort a run.

use thiserror::Error;

/// The main error type for geodispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A job or run repository call failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// A task queue submission failed.
    #[error("{0}")]
    Queue(#[from] QueueError),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A node raised an infrastructure failure while processing.
    #[error("{node}: {message}")]
    NodeFailed {
        /// Name of the failing node.
        node: String,
        /// The underlying failure message.
        message: String,
    },

    /// The trigger carried metadata the pipeline cannot act on.
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// No pipeline is registered for the requested trigger or name.
    #[error("Unknown pipeline: {0}")]
    UnknownPipeline(String),

    /// The pipeline graph is malformed.
    #[error("Invalid pipeline graph: {0}")]
    GraphDefinition(String),

    /// The run exceeded its configured wall-clock budget.
    #[error("Pipeline run timed out after {0}s")]
    Timeout(u64),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Creates a node failure error.
    #[must_use]
    pub fn node_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeFailed {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Returns true if the failure was already recorded on the context by the
    /// node wrapper.
    #[must_use]
    pub fn is_recorded_by_node(&self) -> bool {
        matches!(self, Self::NodeFailed { .. })
    }
}

/// Error raised by a job or run repository.
#[derive(Debug, Clone, Error)]
#[error("Repository error during {operation}: {message}")]
pub struct RepositoryError {
    /// The repository operation that failed (e.g. "get_eligible").
    pub operation: String,
    /// The error message.
    pub message: String,
}

impl RepositoryError {
    /// Creates a new repository error.
    #[must_use]
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Error raised by a task queue client.
#[derive(Debug, Clone, Error)]
#[error("Queue submission to '{queue}' failed: {message}")]
pub struct QueueError {
    /// The queue the submission targeted ("default" when unrouted).
    pub queue: String,
    /// The error message.
    pub message: String,
}

impl QueueError {
    /// Creates a new queue error.
    #[must_use]
    pub fn new(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            message: message.into(),
        }
    }
}

/// Error raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override held an unusable value.
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv {
        /// Environment variable name.
        key: String,
        /// The offending value.
        value: String,
    },

    /// A field failed validation.
    #[error("Invalid config field '{field}': {reason}")]
    Invalid {
        /// The field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The logging subscriber could not be installed.
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_failed_display() {
        let err = DispatchError::node_failed("JobScanner", "connection refused");
        assert_eq!(err.to_string(), "JobScanner: connection refused");
        assert!(err.is_recorded_by_node());
    }

    #[test]
    fn test_repository_error_conversion() {
        let err: DispatchError = RepositoryError::new("get_enabled", "db down").into();
        assert!(matches!(err, DispatchError::Repository(_)));
        assert!(err.to_string().contains("get_enabled"));
        assert!(!err.is_recorded_by_node());
    }

    #[test]
    fn test_queue_error_display() {
        let err = QueueError::new("geospatial", "broker unreachable");
        assert_eq!(
            err.to_string(),
            "Queue submission to 'geospatial' failed: broker unreachable"
        );
    }

    #[test]
    fn test_config_error_invalid() {
        let err = ConfigError::Invalid {
            field: "task_name".to_string(),
            reason: "must not be empty".to_string(),
        };
        assert!(err.to_string().contains("task_name"));
    }
}
