//! Ports - injected collaborators the pipeline nodes depend on.
//!
//! The job store, run store, task broker and health probes live outside this
//! crate. Nodes only see them through these traits, bundled in
//! `DispatchPorts`. Implementations are shared across concurrent runs and
//! must provide their own concurrency safety.

use crate::core::{JobSnapshot, JobType, RetryParams, TriggerType};
use crate::errors::{DispatchError, QueueError, RepositoryError};
use crate::utils::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Read and update access to persisted job definitions.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Jobs eligible for a trigger.
    ///
    /// For scheduled triggers: enabled jobs whose next run is unset or due.
    /// For other triggers: jobs matching `filters`.
    async fn get_eligible(
        &self,
        trigger_type: TriggerType,
        filters: &Map<String, Value>,
    ) -> Result<Vec<JobSnapshot>, RepositoryError>;

    /// A single job by id.
    async fn get_by_id(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, RepositoryError>;

    /// All enabled jobs.
    async fn get_enabled(&self) -> Result<Vec<JobSnapshot>, RepositoryError>;

    /// All jobs of a type, enabled or not.
    async fn get_by_type(&self, job_type: JobType) -> Result<Vec<JobSnapshot>, RepositoryError>;

    /// Jobs whose payload matches every criterion.
    async fn search_by_payload(
        &self,
        criteria: &Map<String, Value>,
    ) -> Result<Vec<JobSnapshot>, RepositoryError>;

    /// Records the time of the latest dispatch.
    async fn update_last_run(&self, job_id: Uuid, at: Timestamp) -> Result<(), RepositoryError>;
}

/// Status of a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Dispatched and not yet finished.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
}

/// Persisted audit entry for one dispatch attempt of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id.
    pub id: Uuid,
    /// The dispatched job.
    pub job_id: Uuid,
    /// Trigger that caused the dispatch.
    pub triggered_by: TriggerType,
    /// Host that performed the dispatch.
    pub execution_host: String,
    /// Current status.
    pub status: RunStatus,
    /// When the record was created.
    pub started_at: Timestamp,
}

/// Write access to run records.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Creates a run record in `Running` status.
    async fn create(
        &self,
        job_id: Uuid,
        triggered_by: TriggerType,
        execution_host: &str,
    ) -> Result<RunRecord, RepositoryError>;
}

/// How much routing detail a submission carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum SubmitRouting {
    /// Queue, routing key and exchange.
    Explicit {
        /// Target queue.
        queue: String,
        /// Routing key.
        routing_key: String,
        /// Exchange.
        exchange: String,
    },
    /// Queue name only.
    QueueOnly {
        /// Target queue.
        queue: String,
    },
    /// No routing; the broker's default queue.
    Default,
}

impl SubmitRouting {
    /// The tier this routing corresponds to.
    #[must_use]
    pub const fn tier(&self) -> SubmitTier {
        match self {
            Self::Explicit { .. } => SubmitTier::Explicit,
            Self::QueueOnly { .. } => SubmitTier::QueueOnly,
            Self::Default => SubmitTier::Default,
        }
    }

    /// The queue targeted, or `"default"`.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        match self {
            Self::Explicit { queue, .. } | Self::QueueOnly { queue } => queue,
            Self::Default => "default",
        }
    }
}

/// Fallback tier of a submission, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTier {
    /// Full explicit routing.
    Explicit,
    /// Queue name only.
    QueueOnly,
    /// Default queue.
    Default,
}

impl fmt::Display for SubmitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::QueueOnly => write!(f, "queue_only"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A unit of work handed to the task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission {
    /// Registered worker task name.
    pub task_name: String,
    /// Task arguments.
    pub payload: Value,
    /// Routing detail for this attempt.
    pub routing: SubmitRouting,
    /// Retry parameters for the worker.
    pub retry: RetryParams,
}

/// Opaque handle for an accepted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    /// Task id assigned by the broker.
    pub id: String,
}

/// Client for the asynchronous worker pool.
///
/// `submit` must fail fast rather than block indefinitely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskQueueClient: Send + Sync {
    /// Submits a task.
    async fn submit(&self, submission: TaskSubmission) -> Result<TaskHandle, QueueError>;
}

/// Pass/fail checks for services a job needs before it can run.
///
/// An `Err` means the check itself broke; validation records it against the
/// job being checked and moves on.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Whether the upstream imagery service is reachable.
    async fn imagery_service_available(&self) -> Result<bool, DispatchError>;

    /// Whether result storage is available.
    async fn storage_available(&self) -> Result<bool, DispatchError>;

    /// Whether the database is reachable.
    async fn database_available(&self) -> Result<bool, DispatchError>;
}

/// A probe that reports every service healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn imagery_service_available(&self) -> Result<bool, DispatchError> {
        Ok(true)
    }

    async fn storage_available(&self) -> Result<bool, DispatchError> {
        Ok(true)
    }

    async fn database_available(&self) -> Result<bool, DispatchError> {
        Ok(true)
    }
}

/// The collaborators a dispatch pipeline is wired to.
#[derive(Clone)]
pub struct DispatchPorts {
    /// Job definition store.
    pub jobs: Arc<dyn JobRepository>,
    /// Run record store.
    pub runs: Arc<dyn RunRepository>,
    /// Task queue client.
    pub queue: Arc<dyn TaskQueueClient>,
    /// Prerequisite health checks.
    pub health: Arc<dyn HealthProbe>,
}

impl fmt::Debug for DispatchPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPorts").finish_non_exhaustive()
    }
}

impl DispatchPorts {
    /// Creates ports with an always-healthy probe.
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        runs: Arc<dyn RunRepository>,
        queue: Arc<dyn TaskQueueClient>,
    ) -> Self {
        Self {
            jobs,
            runs,
            queue,
            health: Arc::new(AlwaysHealthy),
        }
    }

    /// Replaces the health probe.
    #[must_use]
    pub fn with_health(mut self, health: Arc<dyn HealthProbe>) -> Self {
        self.health = health;
        self
    }
}
