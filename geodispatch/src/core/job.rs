//! Job snapshots and their payloads.

use super::{JobType, RoutingDecision, SatelliteType, ScheduleType};
use crate::utils::{parse_timestamp, Timestamp, TimestampError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// A payload field held a value of the wrong JSON type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload field '{field}' must be {expected}")]
pub struct PayloadFieldError {
    /// The offending field.
    pub field: String,
    /// Description of the expected type.
    pub expected: &'static str,
}

/// Free-form job parameters (coordinates, satellite tag, thresholds, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(Map<String, Value>);

impl JobPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing map.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Sets a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Returns a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the field is present (even if null).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the coordinate list, if present and a list.
    #[must_use]
    pub fn coordinates(&self) -> Option<&Vec<Value>> {
        self.0.get("coordinates").and_then(Value::as_array)
    }

    /// Number of coordinate points; zero when absent or malformed.
    #[must_use]
    pub fn coordinate_count(&self) -> usize {
        self.coordinates().map_or(0, Vec::len)
    }

    /// Returns the raw satellite tag.
    #[must_use]
    pub fn satellite_tag(&self) -> Option<&str> {
        self.0.get("satellite_type").and_then(Value::as_str)
    }

    /// Returns the satellite if the tag is on the allow-list.
    #[must_use]
    pub fn satellite(&self) -> Option<SatelliteType> {
        self.satellite_tag().and_then(SatelliteType::parse)
    }

    /// Reads an optional string field.
    ///
    /// # Errors
    ///
    /// Returns `PayloadFieldError` if the field is present, non-null and not
    /// a string.
    pub fn str_field(&self, key: &str) -> Result<Option<&str>, PayloadFieldError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(PayloadFieldError {
                field: key.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Reads an optional boolean flag, absent meaning false.
    ///
    /// # Errors
    ///
    /// Returns `PayloadFieldError` if the field is present, non-null and not
    /// a boolean.
    pub fn flag(&self, key: &str) -> Result<bool, PayloadFieldError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(PayloadFieldError {
                field: key.to_string(),
                expected: "a boolean",
            }),
        }
    }

    /// True if the payload declares a date range with both ends set.
    #[must_use]
    pub fn has_date_range(&self) -> bool {
        let Some(range) = self.0.get("date_range").and_then(Value::as_object) else {
            return false;
        };
        let is_set = |key: &str| {
            range
                .get(key)
                .is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
        };
        is_set("start") && is_set("end")
    }

    /// True if every criterion matches the payload, comparing values by
    /// their string form.
    #[must_use]
    pub fn matches(&self, criteria: &Map<String, Value>) -> bool {
        criteria.iter().all(|(key, expected)| {
            self.0
                .get(key)
                .is_some_and(|actual| value_text(actual) == value_text(expected))
        })
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Retry and rate-limit settings stored on a job definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Overrides the routed retry count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Base delay between retries, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_secs: Option<u64>,
    /// Minimum gap between two runs of the job, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_interval_minutes: Option<i64>,
}

/// What the queuer attaches to a job once its task is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    /// The run record created for this dispatch.
    pub run_id: Uuid,
    /// The task handle returned by the queue.
    pub task_id: String,
    /// When the task was accepted.
    pub queued_at: Timestamp,
}

/// Flattened view of a persisted job definition.
///
/// The persisted fields are never changed by the pipeline. The router and
/// queuer only fill in `routing`, `routing_error` and `dispatch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job definition id.
    pub job_id: Uuid,
    /// Human-readable name.
    pub job_name: String,
    /// Kind of work.
    pub job_type: JobType,
    /// How the job is scheduled.
    #[serde(default)]
    pub schedule_type: ScheduleType,
    /// Cron expression, for cron-scheduled jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_cron: Option<String>,
    /// Interval in days, for interval-scheduled jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_days: Option<u32>,
    /// Whether the job may run.
    pub enabled: bool,
    /// ISO timestamp of the previous run.
    #[serde(default)]
    pub last_run_at: Option<String>,
    /// ISO timestamp of the next scheduled run.
    #[serde(default)]
    pub next_run_at: Option<String>,
    /// Job parameters.
    #[serde(default)]
    pub payload: JobPayload,
    /// Worker function the task executes.
    pub target_function: String,
    /// Retry and rate-limit settings.
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Set by the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingDecision>,
    /// Set by the router when routing raised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_error: Option<String>,
    /// Set by the queuer after a successful submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchReceipt>,
}

impl JobSnapshot {
    /// Creates an enabled, event-triggered job with an empty payload.
    #[must_use]
    pub fn new(
        job_name: impl Into<String>,
        job_type: JobType,
        target_function: impl Into<String>,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_name: job_name.into(),
            job_type,
            schedule_type: ScheduleType::default(),
            schedule_cron: None,
            interval_days: None,
            enabled: true,
            last_run_at: None,
            next_run_at: None,
            payload: JobPayload::new(),
            target_function: target_function.into(),
            retry_policy: RetryPolicy::default(),
            routing: None,
            routing_error: None,
            dispatch: None,
        }
    }

    /// Parses `last_run_at`, if set.
    #[must_use]
    pub fn last_run(&self) -> Option<Result<Timestamp, TimestampError>> {
        self.last_run_at.as_deref().map(parse_timestamp)
    }

    /// Parses `next_run_at`, if set.
    #[must_use]
    pub fn next_run(&self) -> Option<Result<Timestamp, TimestampError>> {
        self.next_run_at.as_deref().map(parse_timestamp)
    }

    /// True if the job's next run is unset or not after `now`.
    ///
    /// An unparsable `next_run_at` counts as due.
    #[must_use]
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self.next_run() {
            None | Some(Err(_)) => true,
            Some(Ok(next)) => next <= now,
        }
    }
}
