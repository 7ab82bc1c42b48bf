//! Priority, bucket and queue assignment.
//!
//! Classification is a pure function of the job and the batch threshold, so
//! routing the same job twice always yields the same decision.

use crate::config::DispatchConfig;
use crate::context::{PipelineContext, RoutingRecord, RoutingStats};
use crate::core::{
    Bucket, JobPayload, JobSnapshot, JobType, PayloadFieldError, Priority, RetryParams,
    RoutingDecision, ScheduleType,
};
use crate::errors::DispatchError;
use crate::nodes::{Node, RouterNode};
use crate::pipeline::NodeKind;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

/// Priority tier; the first matching rule wins.
///
/// # Errors
///
/// Returns `PayloadFieldError` if a consulted payload field has the wrong
/// JSON type.
pub fn priority_for(job: &JobSnapshot) -> Result<Priority, PayloadFieldError> {
    let payload = &job.payload;

    if job.job_type == JobType::AnomalyDetection
        && matches!(payload.str_field("severity")?, Some("high" | "critical"))
    {
        return Ok(Priority::Critical);
    }
    if job.job_type == JobType::Monitoring && payload.flag("real_time")? {
        return Ok(Priority::High);
    }
    if job.schedule_type == ScheduleType::EventTriggered {
        return Ok(Priority::High);
    }
    if matches!(job.schedule_type, ScheduleType::Cron | ScheduleType::Interval) {
        return Ok(Priority::Normal);
    }
    if job.job_type == JobType::ChangeAnalysis
        && payload.str_field("analysis_scope")? == Some("batch")
    {
        return Ok(Priority::Low);
    }
    Ok(Priority::Normal)
}

/// Whether a payload describes batch work.
///
/// # Errors
///
/// Returns `PayloadFieldError` if `batch_processing` is not a boolean.
pub fn is_batch(payload: &JobPayload, coordinate_threshold: usize) -> Result<bool, PayloadFieldError> {
    Ok(payload.coordinate_count() > coordinate_threshold
        || payload.has_date_range()
        || payload.flag("batch_processing")?)
}

/// Estimated processing time in minutes, never below one.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_duration(job: &JobSnapshot) -> u32 {
    let base = match job.job_type {
        JobType::FetchData => 5.0,
        JobType::MetricCalc => 10.0,
        JobType::AnomalyDetection => 15.0,
        JobType::ChangeAnalysis => 20.0,
        JobType::Monitoring => 3.0,
        JobType::AlertEval | JobType::Unknown => 10.0,
    };
    let complexity = 1.0 + job.payload.coordinate_count() as f64 / 100.0;
    let satellite = job
        .payload
        .satellite()
        .map_or(1.0, |sat| sat.duration_multiplier());

    let minutes = (base * complexity * satellite).floor();
    (minutes.min(f64::from(u32::MAX)) as u32).max(1)
}

/// Worker queue for a job type.
#[must_use]
pub const fn task_queue_for(job_type: JobType) -> &'static str {
    match job_type {
        JobType::Monitoring => "monitoring",
        JobType::FetchData => "data_processing",
        _ => "geospatial",
    }
}

/// Retry profile for a job, with the job's own retry count taking precedence.
#[must_use]
pub fn retry_params_for(job: &JobSnapshot) -> RetryParams {
    let max = job.retry_policy.max_retries;
    match job.job_type {
        JobType::Monitoring => RetryParams::monitoring(max.unwrap_or(2)),
        JobType::AnomalyDetection => RetryParams::anomaly_detection(max.unwrap_or(3)),
        _ => RetryParams::standard(max.unwrap_or(3)),
    }
}

/// Computes the full routing decision for one job.
///
/// # Errors
///
/// Returns `PayloadFieldError` if a consulted payload field has the wrong
/// JSON type.
pub fn route_job(
    job: &JobSnapshot,
    coordinate_threshold: usize,
) -> Result<RoutingDecision, PayloadFieldError> {
    let priority = priority_for(job)?;

    let bucket = if priority == Priority::Critical {
        Bucket::HighPriority
    } else if job.job_type == JobType::Monitoring || job.schedule_type == ScheduleType::Cron {
        Bucket::Monitoring
    } else if is_batch(&job.payload, coordinate_threshold)? {
        Bucket::BatchProcessing
    } else {
        Bucket::NormalPriority
    };

    let task_queue = task_queue_for(job.job_type);
    Ok(RoutingDecision {
        bucket,
        priority,
        estimated_duration_minutes: estimate_duration(job),
        task_queue: task_queue.to_string(),
        routing_key: format!("{task_queue}.process"),
        exchange: task_queue.to_string(),
        retry: retry_params_for(job),
    })
}

/// Partitions `validated_jobs` into buckets.
///
/// Every validated job lands in exactly one bucket; jobs that cannot be
/// classified go to `failed_routing` with `routing_error` set.
#[derive(Debug, Clone)]
pub struct JobRouter {
    config: Arc<DispatchConfig>,
}

impl JobRouter {
    /// Creates a router.
    #[must_use]
    pub fn new(config: Arc<DispatchConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Node for JobRouter {
    fn name(&self) -> &str {
        NodeKind::Router.node_name()
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        ctx.reset_buckets();
        let mut stats = RoutingStats::default();
        let jobs = ctx.validated_jobs.clone();

        for mut job in jobs {
            match route_job(&job, self.config.batch_coordinate_threshold) {
                Ok(decision) => {
                    stats.total_routed += 1;
                    stats.decisions.push(RoutingRecord {
                        job_id: job.job_id,
                        job_name: job.job_name.clone(),
                        bucket: decision.bucket,
                        priority: decision.priority,
                        estimated_duration_minutes: decision.estimated_duration_minutes,
                    });
                    let bucket = decision.bucket;
                    job.routing = Some(decision);
                    ctx.place(bucket, job);
                }
                Err(e) => {
                    error!(job_id = %job.job_id, error = %e, "Routing failed");
                    stats.failed_routing += 1;
                    ctx.push_error(format!("Routing error for {}: {e}", job.job_name));
                    job.routing_error = Some(e.to_string());
                    ctx.place(Bucket::FailedRouting, job);
                }
            }
        }

        stats.bucket_distribution = ctx.bucket_distribution();
        info!(
            routed = stats.total_routed,
            failed = stats.failed_routing,
            buckets = ctx.routed_jobs.len(),
            "JobRouter finished"
        );
        ctx.execution_stats.routing = Some(stats);
        Ok(())
    }

    fn as_router(&self) -> Option<&dyn RouterNode> {
        Some(self)
    }
}

impl RouterNode for JobRouter {
    fn route(&self, _ctx: &PipelineContext) -> Vec<NodeKind> {
        vec![NodeKind::Queuer, NodeKind::StatsCollector]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RetryPolicy, TriggerMetadata, TriggerType};
    use crate::testing::JobFixture;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn route(job: &JobSnapshot) -> RoutingDecision {
        route_job(job, 100).unwrap()
    }

    #[test]
    fn test_critical_anomaly_goes_high_priority() {
        let job = JobFixture::anomaly("a").payload("severity", json!("critical")).build();
        let decision = route(&job);
        assert_eq!(decision.priority, Priority::Critical);
        assert_eq!(decision.bucket, Bucket::HighPriority);

        let high = JobFixture::anomaly("a").payload("severity", json!("high")).build();
        assert_eq!(route(&high).priority, Priority::Critical);

        let medium = JobFixture::anomaly("a").payload("severity", json!("medium")).build();
        assert_eq!(route(&medium).priority, Priority::High);
    }

    #[test]
    fn test_priority_rule_order() {
        let realtime = JobFixture::monitoring("m")
            .schedule(ScheduleType::Cron)
            .payload("real_time", json!(true))
            .build();
        assert_eq!(priority_for(&realtime), Ok(Priority::High));

        let cron = JobFixture::fetch_data("c").schedule(ScheduleType::Cron).build();
        assert_eq!(priority_for(&cron), Ok(Priority::Normal));

        let batch_scope = JobFixture::change_analysis("ca")
            .schedule(ScheduleType::Unknown)
            .payload("analysis_scope", json!("batch"))
            .build();
        assert_eq!(priority_for(&batch_scope), Ok(Priority::Low));

        let interval_scope = JobFixture::change_analysis("ca")
            .schedule(ScheduleType::Interval)
            .payload("analysis_scope", json!("batch"))
            .build();
        assert_eq!(priority_for(&interval_scope), Ok(Priority::Normal));

        let plain = JobFixture::fetch_data("p").schedule(ScheduleType::Unknown).build();
        assert_eq!(priority_for(&plain), Ok(Priority::Normal));
    }

    #[test]
    fn test_bucket_selection() {
        let monitoring = JobFixture::monitoring("m").build();
        assert_eq!(route(&monitoring).bucket, Bucket::Monitoring);

        let cron = JobFixture::fetch_data("c").schedule(ScheduleType::Cron).points(500).build();
        assert_eq!(route(&cron).bucket, Bucket::Monitoring);

        let large = JobFixture::fetch_data("l").points(150).build();
        assert_eq!(route(&large).bucket, Bucket::BatchProcessing);

        let at_threshold = JobFixture::fetch_data("t").points(100).build();
        assert_eq!(route(&at_threshold).bucket, Bucket::NormalPriority);

        let ranged = JobFixture::change_analysis("r")
            .payload("date_range", json!({"start": "2024-01-01", "end": "2024-12-31"}))
            .build();
        assert_eq!(route(&ranged).bucket, Bucket::BatchProcessing);

        let flagged = JobFixture::metric("f").payload("batch_processing", json!(true)).build();
        assert_eq!(route(&flagged).bucket, Bucket::BatchProcessing);
    }

    #[test]
    fn test_duration_estimate() {
        let fetch = JobFixture::fetch_data("f").build();
        assert_eq!(estimate_duration(&fetch), 5);

        let landsat = JobFixture::change_analysis("c")
            .points(50)
            .payload("satellite_type", json!("Landsat-8"))
            .build();
        assert_eq!(estimate_duration(&landsat), 36);

        let modis = JobFixture::monitoring("m")
            .points(1)
            .payload("satellite_type", json!("MODIS"))
            .build();
        assert_eq!(estimate_duration(&modis), 2);

        let mut tiny = JobFixture::monitoring("m").build();
        tiny.payload = JobPayload::new().with("satellite_type", json!("MODIS"));
        assert_eq!(estimate_duration(&tiny), 2);

        let unknown = JobFixture::new("u", JobType::Unknown).points(0).build();
        assert_eq!(estimate_duration(&unknown), 10);
    }

    #[test]
    fn test_queue_and_retry_parameters() {
        let monitoring = route(&JobFixture::monitoring("m").build());
        assert_eq!(monitoring.task_queue, "monitoring");
        assert_eq!(monitoring.routing_key, "monitoring.process");
        assert_eq!(monitoring.exchange, "monitoring");
        assert_eq!(monitoring.retry, RetryParams::monitoring(2));

        let fetch = route(&JobFixture::fetch_data("f").build());
        assert_eq!(fetch.task_queue, "data_processing");
        assert_eq!(fetch.retry, RetryParams::standard(3));

        let anomaly = route(
            &JobFixture::anomaly("a")
                .retry_policy(RetryPolicy {
                    max_retries: Some(7),
                    ..RetryPolicy::default()
                })
                .build(),
        );
        assert_eq!(anomaly.task_queue, "geospatial");
        assert_eq!(anomaly.retry, RetryParams::anomaly_detection(7));

        assert_eq!(task_queue_for(JobType::MetricCalc), "geospatial");
        assert_eq!(task_queue_for(JobType::AlertEval), "geospatial");
    }

    #[test]
    fn test_routing_is_idempotent() {
        let job = JobFixture::change_analysis("c")
            .points(150)
            .payload("satellite_type", json!("Landsat-8"))
            .build();
        assert_eq!(route(&job), route(&job));
    }

    #[tokio::test]
    async fn test_every_validated_job_lands_in_one_bucket() {
        let mut ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        ctx.validated_jobs = vec![
            JobFixture::anomaly("critical").payload("severity", json!("critical")).build(),
            JobFixture::fetch_data("large").points(150).build(),
            JobFixture::anomaly("broken").payload("severity", json!(9)).build(),
            JobFixture::monitoring("watch").build(),
        ];

        let router = JobRouter::new(Arc::new(DispatchConfig::default()));
        router.process(&mut ctx).await.unwrap();

        assert_eq!(ctx.routed_total(), ctx.validated_jobs.len());
        assert_eq!(ctx.bucket(Bucket::HighPriority)[0].job_name, "critical");
        assert_eq!(ctx.bucket(Bucket::BatchProcessing)[0].job_name, "large");
        assert_eq!(ctx.bucket(Bucket::Monitoring)[0].job_name, "watch");

        let failed = ctx.bucket(Bucket::FailedRouting);
        assert_eq!(failed.len(), 1);
        assert!(failed[0].routing.is_none());
        assert_eq!(
            failed[0].routing_error.as_deref(),
            Some("payload field 'severity' must be a string")
        );
        assert_eq!(
            ctx.errors(),
            &["Routing error for broken: payload field 'severity' must be a string".to_string()]
        );

        let stats = ctx.execution_stats.routing.clone().unwrap();
        assert_eq!(stats.total_routed, 3);
        assert_eq!(stats.failed_routing, 1);
        assert_eq!(stats.decisions.len(), 3);
        assert_eq!(stats.bucket_distribution.get(&Bucket::NormalPriority), Some(&0));
    }

    #[tokio::test]
    async fn test_router_capability_names_queuer_then_stats() {
        let router = JobRouter::new(Arc::new(DispatchConfig::default()));
        let ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        let next = router.as_router().unwrap().route(&ctx);
        assert_eq!(next, vec![NodeKind::Queuer, NodeKind::StatsCollector]);
    }
}
