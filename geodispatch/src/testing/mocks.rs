//! In-memory collaborators for tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::core::{JobSnapshot, JobType, TriggerType};
use crate::errors::{DispatchError, QueueError, RepositoryError};
use crate::ports::{
    HealthProbe, JobRepository, RunRecord, RunRepository, RunStatus, SubmitTier, TaskHandle,
    TaskQueueClient, TaskSubmission,
};
use crate::utils::{format_iso8601, Timestamp};

/// A job repository over a `DashMap`.
///
/// Query results are returned in job-name order. Every call is recorded by
/// method name.
#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<Uuid, JobSnapshot>,
    calls: Mutex<Vec<&'static str>>,
    failure: Mutex<Option<String>>,
    fail_updates: Mutex<bool>,
    lenient_eligibility: Mutex<bool>,
    last_run_updates: Mutex<Vec<(Uuid, Timestamp)>>,
}

impl InMemoryJobRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores or replaces a job.
    pub fn insert(&self, job: JobSnapshot) {
        self.jobs.insert(job.job_id, job);
    }

    /// Returns a stored job.
    #[must_use]
    pub fn job(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.get(&job_id).map(|j| j.clone())
    }

    /// Makes every read fail with `message`.
    pub fn fail_reads(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Makes `update_last_run` fail.
    pub fn fail_last_run_updates(&self) {
        *self.fail_updates.lock() = true;
    }

    /// Makes scheduled eligibility ignore the enabled flag.
    pub fn include_disabled_in_eligible(&self) {
        *self.lenient_eligibility.lock() = true;
    }

    /// Method names called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Successful `update_last_run` calls, in order.
    #[must_use]
    pub fn last_run_updates(&self) -> Vec<(Uuid, Timestamp)> {
        self.last_run_updates.lock().clone()
    }

    fn begin(&self, operation: &'static str) -> Result<(), RepositoryError> {
        self.calls.lock().push(operation);
        match self.failure.lock().as_ref() {
            Some(message) => Err(RepositoryError::new(operation, message.clone())),
            None => Ok(()),
        }
    }

    fn select(&self, predicate: impl Fn(&JobSnapshot) -> bool) -> Vec<JobSnapshot> {
        let mut jobs: Vec<_> = self
            .jobs
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.job_name.cmp(&b.job_name));
        jobs
    }
}

fn matches_filters(job: &JobSnapshot, filters: &Map<String, Value>) -> bool {
    filters.iter().all(|(key, expected)| match key.as_str() {
        "job_type" => expected.as_str() == Some(job.job_type.as_str()),
        "enabled" => expected.as_bool() == Some(job.enabled),
        "job_name" => expected.as_str() == Some(job.job_name.as_str()),
        _ => {
            let mut single = Map::new();
            single.insert(key.clone(), expected.clone());
            job.payload.matches(&single)
        }
    })
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn get_eligible(
        &self,
        trigger_type: TriggerType,
        filters: &Map<String, Value>,
    ) -> Result<Vec<JobSnapshot>, RepositoryError> {
        self.begin("get_eligible")?;
        if trigger_type == TriggerType::Scheduled {
            let now = Utc::now();
            let lenient = *self.lenient_eligibility.lock();
            return Ok(self.select(|job| (lenient || job.enabled) && job.is_due(now)));
        }
        Ok(self.select(|job| matches_filters(job, filters)))
    }

    async fn get_by_id(&self, job_id: Uuid) -> Result<Option<JobSnapshot>, RepositoryError> {
        self.begin("get_by_id")?;
        Ok(self.job(job_id))
    }

    async fn get_enabled(&self) -> Result<Vec<JobSnapshot>, RepositoryError> {
        self.begin("get_enabled")?;
        Ok(self.select(|job| job.enabled))
    }

    async fn get_by_type(&self, job_type: JobType) -> Result<Vec<JobSnapshot>, RepositoryError> {
        self.begin("get_by_type")?;
        Ok(self.select(|job| job.job_type == job_type))
    }

    async fn search_by_payload(
        &self,
        criteria: &Map<String, Value>,
    ) -> Result<Vec<JobSnapshot>, RepositoryError> {
        self.begin("search_by_payload")?;
        Ok(self.select(|job| job.payload.matches(criteria)))
    }

    async fn update_last_run(&self, job_id: Uuid, at: Timestamp) -> Result<(), RepositoryError> {
        self.calls.lock().push("update_last_run");
        if *self.fail_updates.lock() {
            return Err(RepositoryError::new("update_last_run", "write rejected"));
        }
        let mut job = self
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| RepositoryError::new("update_last_run", format!("job {job_id} not found")))?;
        job.last_run_at = Some(format_iso8601(&at));
        self.last_run_updates.lock().push((job_id, at));
        Ok(())
    }
}

/// A run repository over a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    runs: DashMap<Uuid, RunRecord>,
    failure: Mutex<Option<String>>,
}

impl InMemoryRunRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `create` fail with `message`.
    pub fn fail_creates(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// All records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<RunRecord> {
        let mut records: Vec<_> = self.runs.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.started_at);
        records
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if no record was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create(
        &self,
        job_id: Uuid,
        triggered_by: TriggerType,
        execution_host: &str,
    ) -> Result<RunRecord, RepositoryError> {
        if let Some(message) = self.failure.lock().as_ref() {
            return Err(RepositoryError::new("create_run", message.clone()));
        }
        let record = RunRecord {
            id: Uuid::now_v7(),
            job_id,
            triggered_by,
            execution_host: execution_host.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
        };
        self.runs.insert(record.id, record.clone());
        Ok(record)
    }
}

/// A task queue whose failures are scripted per tier or per job.
///
/// Every attempt is recorded, accepted or not.
#[derive(Debug, Default)]
pub struct ScriptedTaskQueue {
    failing_tiers: Mutex<HashSet<SubmitTier>>,
    failing_jobs: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<TaskSubmission>>,
    accepted: Mutex<Vec<TaskSubmission>>,
    next_id: AtomicUsize,
}

impl ScriptedTaskQueue {
    /// Creates a queue that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects submissions made at `tier`.
    pub fn fail_tier(&self, tier: SubmitTier) {
        self.failing_tiers.lock().insert(tier);
    }

    /// Rejects every tier.
    pub fn fail_all_tiers(&self) {
        self.failing_tiers
            .lock()
            .extend([SubmitTier::Explicit, SubmitTier::QueueOnly, SubmitTier::Default]);
    }

    /// Rejects every submission for one job.
    pub fn fail_job(&self, job_id: Uuid) {
        self.failing_jobs.lock().insert(job_id.to_string());
    }

    /// All attempts, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<TaskSubmission> {
        self.attempts.lock().clone()
    }

    /// Accepted submissions, in order.
    #[must_use]
    pub fn accepted(&self) -> Vec<TaskSubmission> {
        self.accepted.lock().clone()
    }
}

#[async_trait]
impl TaskQueueClient for ScriptedTaskQueue {
    async fn submit(&self, submission: TaskSubmission) -> Result<TaskHandle, QueueError> {
        self.attempts.lock().push(submission.clone());

        let tier = submission.routing.tier();
        let job_id = submission
            .payload
            .get("job_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if self.failing_jobs.lock().contains(job_id) || self.failing_tiers.lock().contains(&tier) {
            return Err(QueueError::new(
                submission.routing.queue_name(),
                format!("broker rejected {tier} submission"),
            ));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.accepted.lock().push(submission);
        Ok(TaskHandle {
            id: format!("task-{n}"),
        })
    }
}

/// A health probe with fixed answers.
#[derive(Debug, Clone)]
pub struct StaticHealthProbe {
    /// Imagery service answer.
    pub imagery: bool,
    /// Storage answer.
    pub storage: bool,
    /// Database answer.
    pub database: bool,
    /// When set, every check errors with this message.
    pub broken: Option<String>,
}

impl Default for StaticHealthProbe {
    fn default() -> Self {
        Self {
            imagery: true,
            storage: true,
            database: true,
            broken: None,
        }
    }
}

impl StaticHealthProbe {
    /// All services up.
    #[must_use]
    pub fn healthy() -> Self {
        Self::default()
    }

    /// Imagery service down.
    #[must_use]
    pub fn imagery_down() -> Self {
        Self {
            imagery: false,
            ..Self::default()
        }
    }

    /// Every check errors.
    #[must_use]
    pub fn broken(message: impl Into<String>) -> Self {
        Self {
            broken: Some(message.into()),
            ..Self::default()
        }
    }

    fn answer(&self, up: bool) -> Result<bool, DispatchError> {
        match &self.broken {
            Some(message) => Err(DispatchError::Internal(message.clone())),
            None => Ok(up),
        }
    }
}

#[async_trait]
impl HealthProbe for StaticHealthProbe {
    async fn imagery_service_available(&self) -> Result<bool, DispatchError> {
        self.answer(self.imagery)
    }

    async fn storage_available(&self) -> Result<bool, DispatchError> {
        self.answer(self.storage)
    }

    async fn database_available(&self) -> Result<bool, DispatchError> {
        self.answer(self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::SubmitRouting;
    use crate::testing::JobFixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_job_repository_queries() {
        let repo = InMemoryJobRepository::new();
        repo.insert(JobFixture::anomaly("b").payload("polygon_id", json!(7)).build());
        repo.insert(JobFixture::fetch_data("a").disabled().build());

        let enabled = repo.get_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(repo.get_by_type(JobType::FetchData).await.unwrap().len(), 1);

        let mut criteria = Map::new();
        criteria.insert("polygon_id".to_string(), json!("7"));
        assert_eq!(repo.search_by_payload(&criteria).await.unwrap()[0].job_name, "b");

        let mut filters = Map::new();
        filters.insert("job_type".to_string(), json!("fetch_data"));
        let api = repo.get_eligible(TriggerType::Api, &filters).await.unwrap();
        assert_eq!(api[0].job_name, "a");

        assert_eq!(
            repo.calls(),
            vec!["get_enabled", "get_by_type", "search_by_payload", "get_eligible"]
        );
    }

    #[tokio::test]
    async fn test_job_repository_failure_switch() {
        let repo = InMemoryJobRepository::new();
        repo.fail_reads("connection refused");
        let err = repo.get_enabled().await.unwrap_err();
        assert_eq!(err.operation, "get_enabled");
    }

    #[tokio::test]
    async fn test_scripted_queue_fails_selected_tier() {
        let queue = ScriptedTaskQueue::new();
        queue.fail_tier(SubmitTier::Explicit);

        let submission = |routing| TaskSubmission {
            task_name: "t".to_string(),
            payload: json!({"job_id": "x"}),
            routing,
            retry: crate::core::RetryParams::default(),
        };

        let explicit = SubmitRouting::Explicit {
            queue: "q".to_string(),
            routing_key: "q.process".to_string(),
            exchange: "q".to_string(),
        };
        assert!(queue.submit(submission(explicit)).await.is_err());
        let handle = queue.submit(submission(SubmitRouting::Default)).await.unwrap();

        assert_eq!(handle.id, "task-1");
        assert_eq!(queue.attempts().len(), 2);
        assert_eq!(queue.accepted().len(), 1);
    }

    #[tokio::test]
    async fn test_run_repository_records_running() {
        let runs = InMemoryRunRepository::new();
        let record = runs
            .create(Uuid::new_v4(), TriggerType::Manual, "host-1")
            .await
            .unwrap();
        assert_eq!(record.status, RunStatus::Running);
        assert_eq!(runs.records(), vec![record]);
    }
}
