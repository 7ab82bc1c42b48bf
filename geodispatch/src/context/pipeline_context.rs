//! The mutable record threaded through every node of one pipeline run.

use super::ExecutionStats;
use crate::core::{Bucket, JobSnapshot, TriggerMetadata, TriggerType};
use crate::nodes::NodeRun;
use crate::utils::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Layout version of `PipelineContext`, bumped on incompatible field changes.
pub const CONTEXT_VERSION: u32 = 1;

/// The mutable context for one pipeline execution.
///
/// Created fresh for each run and never shared between runs. Data flows
/// strictly forward: the scanner fills `eligible_jobs`, the validator narrows
/// them into `validated_jobs`, the router partitions those into
/// `routed_jobs`, and the queuer and stats collector read the buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Layout version.
    pub version: u32,
    /// Unique id of this run.
    pub run_id: Uuid,
    /// What started the run.
    pub trigger_type: TriggerType,
    /// Trigger-specific parameters.
    pub trigger_metadata: TriggerMetadata,
    /// When the context was created.
    pub started_at: Timestamp,
    /// Jobs found by the scanner.
    pub eligible_jobs: Vec<JobSnapshot>,
    /// Jobs that passed validation.
    pub validated_jobs: Vec<JobSnapshot>,
    /// Routed jobs by bucket.
    pub routed_jobs: BTreeMap<Bucket, Vec<JobSnapshot>>,
    /// Per-stage statistics.
    pub execution_stats: ExecutionStats,
    /// One record per node execution, in order.
    pub node_runs: Vec<NodeRun>,
    /// Append-only failure descriptions.
    errors: Vec<String>,
}

impl PipelineContext {
    /// Creates a fresh context for a run.
    #[must_use]
    pub fn new(trigger_type: TriggerType, trigger_metadata: TriggerMetadata) -> Self {
        Self {
            version: CONTEXT_VERSION,
            run_id: Uuid::now_v7(),
            trigger_type,
            trigger_metadata,
            started_at: Utc::now(),
            eligible_jobs: Vec::new(),
            validated_jobs: Vec::new(),
            routed_jobs: BTreeMap::new(),
            execution_stats: ExecutionStats::default(),
            node_runs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Appends a failure description.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Appends several failure descriptions.
    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = String>) {
        self.errors.extend(errors);
    }

    /// Returns the accumulated failures.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns true if any failure has been recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Resets `routed_jobs` to the five empty buckets.
    pub fn reset_buckets(&mut self) {
        self.routed_jobs = Bucket::ALL.into_iter().map(|b| (b, Vec::new())).collect();
    }

    /// Places a job in a bucket, creating the bucket if needed.
    pub fn place(&mut self, bucket: Bucket, job: JobSnapshot) {
        self.routed_jobs.entry(bucket).or_default().push(job);
    }

    /// Returns the jobs in a bucket.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> &[JobSnapshot] {
        self.routed_jobs.get(&bucket).map_or(&[], Vec::as_slice)
    }

    /// Total jobs across all buckets, including `failed_routing`.
    #[must_use]
    pub fn routed_total(&self) -> usize {
        self.routed_jobs.values().map(Vec::len).sum()
    }

    /// Jobs across dispatchable buckets.
    #[must_use]
    pub fn dispatchable_total(&self) -> usize {
        self.routed_jobs
            .iter()
            .filter(|(bucket, _)| bucket.is_dispatchable())
            .map(|(_, jobs)| jobs.len())
            .sum()
    }

    /// Bucket sizes.
    #[must_use]
    pub fn bucket_distribution(&self) -> BTreeMap<Bucket, usize> {
        self.routed_jobs
            .iter()
            .map(|(bucket, jobs)| (*bucket, jobs.len()))
            .collect()
    }

    /// Execution host for run records: trigger metadata first, then `default`.
    #[must_use]
    pub fn execution_host<'a>(&'a self, default: &'a str) -> &'a str {
        self.trigger_metadata.execution_host().unwrap_or(default)
    }
}
