//! Typed execution statistics recorded by each stage.

use crate::core::{Bucket, Priority, TriggerType};
use crate::ports::SubmitTier;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Percentage of `successful` over `total`, rounded to two decimals.
///
/// Defined as exactly 100.0 when `total` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// How the scanner selected jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    /// Due, enabled jobs for a scheduler tick.
    ScheduledJobs,
    /// Jobs matching API filters.
    ApiFiltered,
    /// A single job or all enabled jobs.
    ManualSelection,
    /// Jobs chosen by the event dispatch table.
    EventDriven,
}

/// Scanner output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Selection policy used.
    pub method: ScanMethod,
    /// Number of jobs placed in `eligible_jobs`.
    pub jobs_scanned: usize,
    /// When the scan finished.
    pub scanned_at: Timestamp,
}

/// Validator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStats {
    /// Number of jobs accepted.
    pub jobs_validated: usize,
    /// Number of jobs rejected.
    pub validation_errors: usize,
    /// When validation finished.
    pub validated_at: Timestamp,
}

/// One routing decision, as logged for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRecord {
    /// Job id.
    pub job_id: Uuid,
    /// Job name.
    pub job_name: String,
    /// Chosen bucket.
    pub bucket: Bucket,
    /// Chosen priority.
    pub priority: Priority,
    /// Estimated duration in minutes.
    pub estimated_duration_minutes: u32,
}

/// Router output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStats {
    /// Jobs assigned to a dispatchable bucket.
    pub total_routed: usize,
    /// Jobs placed in `failed_routing`.
    pub failed_routing: usize,
    /// Per-job decisions.
    pub decisions: Vec<RoutingRecord>,
    /// Bucket sizes right after routing.
    pub bucket_distribution: BTreeMap<Bucket, usize>,
}

/// One accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuingRecord {
    /// Job id.
    pub job_id: Uuid,
    /// Job name.
    pub job_name: String,
    /// Run record id.
    pub run_id: Uuid,
    /// Task handle id.
    pub task_id: String,
    /// Bucket the job was queued from.
    pub bucket: Bucket,
    /// Task queue the router chose.
    pub task_queue: String,
    /// Routing key the router chose.
    pub routing_key: String,
    /// The submission tier that was accepted.
    pub tier: SubmitTier,
}

/// Queuer output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuingStats {
    /// Jobs accepted by the task queue.
    pub total_queued: usize,
    /// Jobs that could not be queued.
    pub failed_to_queue: usize,
    /// Queued jobs whose last-run timestamp could not be updated.
    pub last_run_update_failures: usize,
    /// Accepted jobs per task queue.
    pub queue_distribution: BTreeMap<String, usize>,
    /// Per-job submission details.
    pub details: Vec<QueuingRecord>,
    /// When queuing finished.
    pub queued_at: Timestamp,
}

/// Final summary computed by the stats collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Trigger of the run.
    pub trigger_type: TriggerType,
    /// When the summary was computed.
    pub completed_at: Timestamp,
    /// Errors accumulated so far.
    pub total_errors: usize,
    /// Jobs found by the scanner.
    pub jobs_discovered: usize,
    /// Jobs accepted by the validator.
    pub jobs_validated: usize,
    /// Jobs in dispatchable buckets.
    pub jobs_routed: usize,
    /// Jobs in `failed_routing`.
    pub jobs_failed_routing: usize,
    /// validated / discovered, as a percentage.
    pub validation_success_rate: f64,
    /// routed / validated, as a percentage.
    pub routing_success_rate: f64,
    /// Final bucket sizes.
    pub bucket_distribution: BTreeMap<Bucket, usize>,
}

/// Statistics accumulated across all stages of one run.
///
/// Each stage owns one typed slot; free-form metrics go to `extra`, where
/// object values are merged key by key rather than replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Scanner output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan: Option<ScanStats>,
    /// Validator output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationStats>,
    /// Router output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingStats>,
    /// Queuer output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queuing: Option<QueuingStats>,
    /// Stats collector output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryStats>,
    /// Untyped metrics keyed by stage name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl ExecutionStats {
    /// Merges free-form metrics for a stage.
    pub fn merge_extra(&mut self, stage: impl Into<String>, metrics: Value) {
        let slot = self.extra.entry(stage.into()).or_insert(Value::Null);
        match (slot, metrics) {
            (Value::Object(existing), Value::Object(incoming)) => {
                existing.extend(incoming);
            }
            (slot, metrics) => *slot = metrics,
        }
    }

    /// Jobs queued so far; zero if the queuer has not run.
    #[must_use]
    pub fn total_queued(&self) -> usize {
        self.queuing.as_ref().map_or(0, |q| q.total_queued)
    }
}
