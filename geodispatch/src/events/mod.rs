//! Lifecycle events emitted while a pipeline runs.
//!
//! The executor reports `pipeline.*` and `node.*` events to an `EventSink`.
//! Sinks are injected per pipeline; the default discards everything.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// A lifecycle event of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A run began.
    #[serde(rename = "pipeline.started")]
    PipelineStarted {
        /// Run id.
        run_id: Uuid,
        /// Pipeline name.
        pipeline: String,
        /// Trigger type, as a string.
        trigger_type: String,
    },
    /// A node began.
    #[serde(rename = "node.started")]
    NodeStarted {
        /// Run id.
        run_id: Uuid,
        /// Node name.
        node: String,
    },
    /// A node finished without error.
    #[serde(rename = "node.completed")]
    NodeCompleted {
        /// Run id.
        run_id: Uuid,
        /// Node name.
        node: String,
        /// Wall-clock duration.
        duration_ms: u64,
    },
    /// A node returned an error.
    #[serde(rename = "node.failed")]
    NodeFailed {
        /// Run id.
        run_id: Uuid,
        /// Node name.
        node: String,
        /// Error message.
        error: String,
    },
    /// A run finished; it may still carry recorded errors.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted {
        /// Run id.
        run_id: Uuid,
        /// Whether no errors were recorded.
        success: bool,
        /// Jobs submitted to the task queue.
        jobs_queued: usize,
        /// Errors recorded during the run.
        error_count: usize,
        /// Wall-clock duration.
        duration_ms: u64,
    },
    /// A run was aborted by a fatal error.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed {
        /// Run id.
        run_id: Uuid,
        /// The fatal error.
        error: String,
    },
}

impl PipelineEvent {
    /// The dotted event type, e.g. `node.completed`.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::PipelineStarted { .. } => "pipeline.started",
            Self::NodeStarted { .. } => "node.started",
            Self::NodeCompleted { .. } => "node.completed",
            Self::NodeFailed { .. } => "node.failed",
            Self::PipelineCompleted { .. } => "pipeline.completed",
            Self::PipelineFailed { .. } => "pipeline.failed",
        }
    }

    /// The run the event belongs to.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::PipelineStarted { run_id, .. }
            | Self::NodeStarted { run_id, .. }
            | Self::NodeCompleted { run_id, .. }
            | Self::NodeFailed { run_id, .. }
            | Self::PipelineCompleted { run_id, .. }
            | Self::PipelineFailed { run_id, .. } => *run_id,
        }
    }

    /// The event as a JSON object, including its `type` tag.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({"type": self.event_type()}))
    }
}
