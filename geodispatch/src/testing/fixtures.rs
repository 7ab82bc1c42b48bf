//! Job builders that pass validation out of the box.

use crate::core::{JobPayload, JobSnapshot, JobType, RetryPolicy, ScheduleType};
use crate::utils::{format_iso8601, Timestamp};
use serde_json::{json, Value};

/// `n` coordinate pairs along a diagonal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn coordinates(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| json!([i as f64 * 0.01, i as f64 * 0.01]))
            .collect(),
    )
}

/// Builder for a job snapshot whose payload satisfies its type's rules.
#[derive(Debug, Clone)]
pub struct JobFixture {
    job: JobSnapshot,
}

impl JobFixture {
    /// A valid job of `job_type` with a four-point polygon on Sentinel-2.
    #[must_use]
    pub fn new(name: &str, job_type: JobType) -> Self {
        let mut payload = JobPayload::new()
            .with("coordinates", coordinates(4))
            .with("satellite_type", json!("Sentinel-2"));

        payload = match job_type {
            JobType::AnomalyDetection => payload
                .with("metrics", json!(["ndvi"]))
                .with("threshold_config", json!({"ndvi": {"min": 0.2}})),
            JobType::ChangeAnalysis => payload
                .with("date_range", json!({"start": null, "end": null}))
                .with("analysis_type", json!("land_cover")),
            JobType::Monitoring => payload.with("validation_rules", json!({"cloud_cover_max": 20})),
            _ => payload,
        };

        let mut job = JobSnapshot::new(name, job_type, format!("tasks.{}", job_type.as_str()));
        job.payload = payload;
        Self { job }
    }

    /// A valid fetch-data job.
    #[must_use]
    pub fn fetch_data(name: &str) -> Self {
        Self::new(name, JobType::FetchData)
    }

    /// A valid anomaly-detection job.
    #[must_use]
    pub fn anomaly(name: &str) -> Self {
        Self::new(name, JobType::AnomalyDetection)
    }

    /// A valid change-analysis job without a date range.
    #[must_use]
    pub fn change_analysis(name: &str) -> Self {
        Self::new(name, JobType::ChangeAnalysis)
    }

    /// A valid monitoring job.
    #[must_use]
    pub fn monitoring(name: &str) -> Self {
        Self::new(name, JobType::Monitoring)
    }

    /// A valid metric-calc job.
    #[must_use]
    pub fn metric(name: &str) -> Self {
        Self::new(name, JobType::MetricCalc)
    }

    /// Sets a payload field.
    #[must_use]
    pub fn payload(mut self, key: &str, value: Value) -> Self {
        self.job.payload = self.job.payload.with(key, value);
        self
    }

    /// Replaces the coordinate list with `n` points.
    #[must_use]
    pub fn points(self, n: usize) -> Self {
        self.payload("coordinates", coordinates(n))
    }

    /// Sets the schedule type.
    #[must_use]
    pub fn schedule(mut self, schedule_type: ScheduleType) -> Self {
        self.job.schedule_type = schedule_type;
        self
    }

    /// Disables the job.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.job.enabled = false;
        self
    }

    /// Sets the previous run time.
    #[must_use]
    pub fn last_run(mut self, at: Timestamp) -> Self {
        self.job.last_run_at = Some(format_iso8601(&at));
        self
    }

    /// Sets the next run time.
    #[must_use]
    pub fn next_run(mut self, at: Timestamp) -> Self {
        self.job.next_run_at = Some(format_iso8601(&at));
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.job.retry_policy = policy;
        self
    }

    /// Sets the target function.
    #[must_use]
    pub fn target_function(mut self, target: &str) -> Self {
        self.job.target_function = target.to_string();
        self
    }

    /// Returns the snapshot.
    #[must_use]
    pub fn build(self) -> JobSnapshot {
        self.job
    }
}

impl From<JobFixture> for JobSnapshot {
    fn from(fixture: JobFixture) -> Self {
        fixture.build()
    }
}
