//! Readiness checks that narrow `eligible_jobs` to `validated_jobs`.

use crate::config::DispatchConfig;
use crate::context::{PipelineContext, ValidationStats};
use crate::core::{JobSnapshot, SatelliteType};
use crate::errors::DispatchError;
use crate::nodes::Node;
use crate::pipeline::NodeKind;
use crate::ports::DispatchPorts;
use crate::utils::Timestamp;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a job was not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The job is disabled.
    Disabled,
    /// A required payload field is absent.
    MissingField(&'static str),
    /// `coordinates` is not a non-empty list.
    InvalidCoordinates,
    /// `satellite_type` is not on the allow-list.
    UnsupportedSatellite(String),
    /// The job ran less than `min_interval_minutes` ago.
    RateLimited {
        /// The interval that applied.
        min_interval_minutes: i64,
    },
    /// `target_function` is empty.
    MissingTargetFunction,
    /// A prerequisite service reported unavailable.
    PrerequisiteUnavailable(&'static str),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "job is disabled"),
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
            Self::InvalidCoordinates => write!(f, "coordinates must be a non-empty list"),
            Self::UnsupportedSatellite(tag) => write!(
                f,
                "unsupported satellite type '{tag}' (expected one of {})",
                SatelliteType::ALL.map(SatelliteType::as_str).join(", ")
            ),
            Self::RateLimited {
                min_interval_minutes,
            } => write!(f, "rate limited: last run less than {min_interval_minutes} minutes ago"),
            Self::MissingTargetFunction => write!(f, "missing target_function"),
            Self::PrerequisiteUnavailable(service) => write!(f, "{service} unavailable"),
        }
    }
}

/// Checks the payload fields every job and its job type require.
///
/// # Errors
///
/// Returns the first failed rule.
pub fn check_payload(job: &JobSnapshot) -> Result<(), Rejection> {
    const COMMON: [&str; 2] = ["coordinates", "satellite_type"];

    let payload = &job.payload;
    if let Some(missing) = COMMON
        .iter()
        .chain(job.job_type.extra_required_fields())
        .find(|field| !payload.contains(field))
    {
        return Err(Rejection::MissingField(*missing));
    }

    if payload.coordinate_count() == 0 {
        return Err(Rejection::InvalidCoordinates);
    }

    if payload.satellite().is_none() {
        let tag = match payload.get("satellite_type") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        return Err(Rejection::UnsupportedSatellite(tag));
    }

    Ok(())
}

/// Checks the minimum gap since the job's previous run.
///
/// A job with no previous run, or one whose timestamp cannot be parsed,
/// passes. A negative interval counts as zero; one too large to represent
/// is treated like an unparsable timestamp.
///
/// # Errors
///
/// Returns `Rejection::RateLimited` if the job ran too recently.
pub fn check_rate_limit(
    job: &JobSnapshot,
    default_min_interval_minutes: i64,
    now: Timestamp,
) -> Result<(), Rejection> {
    let last_run = match job.last_run() {
        None => return Ok(()),
        Some(Ok(at)) => at,
        Some(Err(e)) => {
            warn!(job = %job.job_name, error = %e, "Unparsable last_run_at, allowing execution");
            return Ok(());
        }
    };

    let mut min_interval_minutes = job
        .retry_policy
        .min_interval_minutes
        .unwrap_or(default_min_interval_minutes);
    if min_interval_minutes < 0 {
        warn!(
            job = %job.job_name,
            min_interval_minutes,
            "Negative min_interval_minutes, clamping to zero"
        );
        min_interval_minutes = 0;
    }

    let Some(min_interval) = Duration::try_minutes(min_interval_minutes) else {
        warn!(
            job = %job.job_name,
            min_interval_minutes,
            "min_interval_minutes out of range, allowing execution"
        );
        return Ok(());
    };

    if now - last_run < min_interval {
        return Err(Rejection::RateLimited {
            min_interval_minutes,
        });
    }
    Ok(())
}

/// Fills `validated_jobs`, recording one error per rejected job.
#[derive(Debug, Clone)]
pub struct JobValidator {
    ports: DispatchPorts,
    config: Arc<DispatchConfig>,
}

impl JobValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(ports: DispatchPorts, config: Arc<DispatchConfig>) -> Self {
        Self { ports, config }
    }

    /// Runs every rule against one job.
    ///
    /// `Ok(Err(_))` is a rejection; `Err(_)` means a check itself broke.
    async fn validate(
        &self,
        job: &JobSnapshot,
        now: Timestamp,
    ) -> Result<Result<(), Rejection>, DispatchError> {
        if !job.enabled {
            return Ok(Err(Rejection::Disabled));
        }
        if let Err(rejection) = check_payload(job) {
            return Ok(Err(rejection));
        }
        if let Err(rejection) =
            check_rate_limit(job, self.config.default_min_interval_minutes, now)
        {
            return Ok(Err(rejection));
        }
        if job.target_function.trim().is_empty() {
            return Ok(Err(Rejection::MissingTargetFunction));
        }
        self.check_prerequisites(job).await
    }

    async fn check_prerequisites(
        &self,
        job: &JobSnapshot,
    ) -> Result<Result<(), Rejection>, DispatchError> {
        let health = &self.ports.health;
        if job.job_type.needs_imagery_service() && !health.imagery_service_available().await? {
            return Ok(Err(Rejection::PrerequisiteUnavailable("imagery service")));
        }
        if !health.database_available().await? {
            return Ok(Err(Rejection::PrerequisiteUnavailable("database")));
        }
        if !health.storage_available().await? {
            return Ok(Err(Rejection::PrerequisiteUnavailable("storage")));
        }
        Ok(Ok(()))
    }
}

#[async_trait]
impl Node for JobValidator {
    fn name(&self) -> &str {
        NodeKind::Validator.node_name()
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        let now = Utc::now();
        let mut validated = Vec::with_capacity(ctx.eligible_jobs.len());
        let mut rejections = Vec::new();

        for job in &ctx.eligible_jobs {
            match self.validate(job, now).await {
                Ok(Ok(())) => validated.push(job.clone()),
                Ok(Err(rejection)) => {
                    debug!(job = %job.job_name, reason = %rejection, "Job rejected");
                    rejections.push(format!("Job {} failed validation: {rejection}", job.job_name));
                }
                Err(e) => {
                    error!(job_id = %job.job_id, error = %e, "Validation error");
                    rejections.push(format!("Job {} validation error: {e}", job.job_name));
                }
            }
        }

        info!(
            passed = validated.len(),
            failed = rejections.len(),
            "JobValidator finished"
        );

        ctx.execution_stats.validation = Some(ValidationStats {
            jobs_validated: validated.len(),
            validation_errors: rejections.len(),
            validated_at: now,
        });
        ctx.validated_jobs = validated;
        ctx.extend_errors(rejections);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobType, RetryPolicy, TriggerMetadata, TriggerType};
    use crate::testing::{JobFixture, StaticHealthProbe, TestPorts};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn validate(ports: &TestPorts, jobs: Vec<JobSnapshot>) -> PipelineContext {
        let mut ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        ctx.eligible_jobs = jobs;
        JobValidator::new(ports.ports(), Arc::new(DispatchConfig::default()))
            .process(&mut ctx)
            .await
            .unwrap();
        ctx
    }

    #[test]
    fn test_payload_rules() {
        assert_eq!(check_payload(&JobFixture::anomaly("a").build()), Ok(()));

        let mut job = JobFixture::anomaly("a").build();
        job.payload = crate::core::JobPayload::new()
            .with("coordinates", json!([[0, 0]]))
            .with("satellite_type", json!("MODIS"))
            .with("metrics", json!([]));
        assert_eq!(check_payload(&job), Err(Rejection::MissingField("threshold_config")));

        let job = JobFixture::fetch_data("f").payload("coordinates", json!([])).build();
        assert_eq!(check_payload(&job), Err(Rejection::InvalidCoordinates));

        let job = JobFixture::fetch_data("f").payload("satellite_type", json!("sentinel-2")).build();
        assert_eq!(
            check_payload(&job),
            Err(Rejection::UnsupportedSatellite("sentinel-2".to_string()))
        );
    }

    #[test]
    fn test_rate_limit_rule() {
        let now = Utc::now();

        let never_ran = JobFixture::fetch_data("n").build();
        assert_eq!(check_rate_limit(&never_ran, 5, now), Ok(()));

        let recent = JobFixture::fetch_data("r").last_run(now - Duration::minutes(2)).build();
        assert!(check_rate_limit(&recent, 5, now).is_err());
        assert_eq!(check_rate_limit(&recent, 1, now), Ok(()));

        let overridden = JobFixture::fetch_data("o")
            .last_run(now - Duration::minutes(10))
            .retry_policy(RetryPolicy {
                min_interval_minutes: Some(30),
                ..RetryPolicy::default()
            })
            .build();
        assert_eq!(
            check_rate_limit(&overridden, 5, now),
            Err(Rejection::RateLimited {
                min_interval_minutes: 30
            })
        );

        let mut garbled = JobFixture::fetch_data("g").build();
        garbled.last_run_at = Some("yesterday-ish".to_string());
        assert_eq!(check_rate_limit(&garbled, 5, now), Ok(()));
    }

    #[test]
    fn test_rate_limit_interval_bounds() {
        let now = Utc::now();
        let with_interval = |minutes| {
            JobFixture::fetch_data("j")
                .last_run(now - Duration::minutes(10))
                .retry_policy(RetryPolicy {
                    min_interval_minutes: Some(minutes),
                    ..RetryPolicy::default()
                })
                .build()
        };

        assert_eq!(check_rate_limit(&with_interval(i64::MAX / 2), 5, now), Ok(()));
        assert_eq!(check_rate_limit(&with_interval(i64::MIN), 5, now), Ok(()));
        assert_eq!(check_rate_limit(&with_interval(-30), 5, now), Ok(()));

        let just_ran = JobFixture::fetch_data("j")
            .last_run(now)
            .retry_policy(RetryPolicy {
                min_interval_minutes: Some(-30),
                ..RetryPolicy::default()
            })
            .build();
        assert_eq!(check_rate_limit(&just_ran, 5, now), Ok(()));
    }

    #[tokio::test]
    async fn test_oversized_interval_does_not_abort_batch() {
        let ports = TestPorts::new();
        let oversized = JobFixture::fetch_data("oversized")
            .last_run(Utc::now() - Duration::minutes(10))
            .retry_policy(RetryPolicy {
                min_interval_minutes: Some(i64::MAX / 2),
                ..RetryPolicy::default()
            })
            .build();

        let ctx = validate(&ports, vec![oversized, JobFixture::fetch_data("plain").build()]).await;

        let names: Vec<_> = ctx.validated_jobs.iter().map(|j| j.job_name.as_str()).collect();
        assert_eq!(names, vec!["oversized", "plain"]);
        assert!(!ctx.has_errors());
    }

    #[tokio::test]
    async fn test_rejections_are_recorded_and_batch_continues() {
        let ports = TestPorts::new();
        let ctx = validate(
            &ports,
            vec![
                JobFixture::fetch_data("ok").build(),
                JobFixture::fetch_data("off").disabled().build(),
                JobFixture::fetch_data("nobody").target_function("  ").build(),
                JobFixture::monitoring("ok-too").build(),
            ],
        )
        .await;

        let names: Vec<_> = ctx.validated_jobs.iter().map(|j| j.job_name.as_str()).collect();
        assert_eq!(names, vec!["ok", "ok-too"]);
        assert_eq!(
            ctx.errors(),
            &[
                "Job off failed validation: job is disabled".to_string(),
                "Job nobody failed validation: missing target_function".to_string(),
            ]
        );
        let stats = ctx.execution_stats.validation.as_ref().unwrap();
        assert_eq!(stats.jobs_validated, 2);
        assert_eq!(stats.validation_errors, 2);
    }

    #[tokio::test]
    async fn test_imagery_check_only_for_imagery_jobs() {
        let mut ports = TestPorts::new();
        ports.health = Arc::new(StaticHealthProbe::imagery_down());

        let ctx = validate(
            &ports,
            vec![
                JobFixture::anomaly("anomaly").build(),
                JobFixture::change_analysis("change").build(),
                JobFixture::new("metric", JobType::MetricCalc).build(),
            ],
        )
        .await;

        assert_eq!(ctx.validated_jobs.len(), 1);
        assert_eq!(ctx.validated_jobs[0].job_name, "metric");
        assert!(ctx.errors()[0].ends_with("imagery service unavailable"));
    }

    #[tokio::test]
    async fn test_broken_probe_is_a_per_job_error() {
        let mut ports = TestPorts::new();
        ports.health = Arc::new(StaticHealthProbe::broken("probe timed out"));

        let ctx = validate(
            &ports,
            vec![JobFixture::fetch_data("a").build(), JobFixture::fetch_data("b").build()],
        )
        .await;

        assert!(ctx.validated_jobs.is_empty());
        assert_eq!(ctx.errors().len(), 2);
        assert!(ctx.errors()[1].starts_with("Job b validation error: "));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let ctx = validate(&TestPorts::new(), Vec::new()).await;
        assert!(ctx.validated_jobs.is_empty());
        assert!(!ctx.has_errors());
        assert_eq!(ctx.execution_stats.validation.as_ref().unwrap().jobs_validated, 0);
    }
}
