//! Buckets, priorities and the routing decision attached to each job.

use super::RetryParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named partition of routed jobs.
///
/// Declaration order is the iteration order of `PipelineContext::routed_jobs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Critical work dispatched ahead of everything else.
    HighPriority,
    /// Ordinary work.
    NormalPriority,
    /// Large-area or long-horizon work.
    BatchProcessing,
    /// Monitoring and cron-scheduled work.
    Monitoring,
    /// Jobs that could not be routed or queued.
    FailedRouting,
}

impl Bucket {
    /// Every bucket, in iteration order.
    pub const ALL: [Self; 5] = [
        Self::HighPriority,
        Self::NormalPriority,
        Self::BatchProcessing,
        Self::Monitoring,
        Self::FailedRouting,
    ];

    /// The buckets whose jobs are handed to the task queue.
    pub const DISPATCHABLE: [Self; 4] = [
        Self::HighPriority,
        Self::NormalPriority,
        Self::BatchProcessing,
        Self::Monitoring,
    ];

    /// Returns the bucket name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighPriority => "high_priority",
            Self::NormalPriority => "normal_priority",
            Self::BatchProcessing => "batch_processing",
            Self::Monitoring => "monitoring",
            Self::FailedRouting => "failed_routing",
        }
    }

    /// Returns true for every bucket except `FailedRouting`.
    #[must_use]
    pub const fn is_dispatchable(self) -> bool {
        !matches!(self, Self::FailedRouting)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Severe anomalies.
    Critical,
    /// Real-time monitoring and event-triggered work.
    High,
    /// Regular scheduled work.
    Normal,
    /// Background batch analysis.
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Routing metadata the router attaches to a job snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// The bucket the job was placed in.
    pub bucket: Bucket,
    /// The priority tier.
    pub priority: Priority,
    /// Estimated processing time in minutes (at least 1).
    pub estimated_duration_minutes: u32,
    /// Task queue the worker pool consumes from.
    pub task_queue: String,
    /// Routing key used with explicit routing.
    pub routing_key: String,
    /// Exchange used with explicit routing.
    pub exchange: String,
    /// Retry parameters for the submitted task.
    pub retry: RetryParams,
}
