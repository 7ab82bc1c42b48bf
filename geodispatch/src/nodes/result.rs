//! Execution records for individual node runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// The node completed.
    Completed,
    /// The node raised an infrastructure failure.
    Failed,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Timing and outcome of one node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRun {
    /// Node name.
    pub node: String,
    /// Outcome.
    pub status: NodeStatus,
    /// When the node started.
    pub started_at: DateTime<Utc>,
    /// When the node ended.
    pub ended_at: DateTime<Utc>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRun {
    /// Creates a completed record ending now.
    #[must_use]
    pub fn completed(node: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            node: node.into(),
            status: NodeStatus::Completed,
            started_at,
            ended_at: Utc::now(),
            error: None,
        }
    }

    /// Creates a failed record ending now.
    #[must_use]
    pub fn failed(
        node: impl Into<String>,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            status: NodeStatus::Failed,
            started_at,
            ended_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        (self.ended_at - self.started_at).num_microseconds().unwrap_or(0) as f64 / 1000.0
    }

    /// Returns true if the node completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, NodeStatus::Completed)
    }
}
