//! Submission of routed jobs to the task queue.

use crate::config::DispatchConfig;
use crate::context::{PipelineContext, QueuingRecord, QueuingStats};
use crate::core::{Bucket, DispatchReceipt, JobSnapshot, RoutingDecision, TriggerType};
use crate::errors::{DispatchError, QueueError};
use crate::nodes::Node;
use crate::pipeline::NodeKind;
use crate::ports::{DispatchPorts, RunRecord, SubmitRouting, SubmitTier, TaskHandle, TaskSubmission};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The submission tiers for a decision, most specific first.
#[must_use]
pub fn fallback_tiers(decision: &RoutingDecision) -> [SubmitRouting; 3] {
    [
        SubmitRouting::Explicit {
            queue: decision.task_queue.clone(),
            routing_key: decision.routing_key.clone(),
            exchange: decision.exchange.clone(),
        },
        SubmitRouting::QueueOnly {
            queue: decision.task_queue.clone(),
        },
        SubmitRouting::Default,
    ]
}

/// Dispatches every job in the dispatchable buckets.
///
/// Each job gets a run record, then a submission with fallback. A job whose
/// every tier fails is moved to `failed_routing`.
#[derive(Debug, Clone)]
pub struct JobQueuer {
    ports: DispatchPorts,
    config: Arc<DispatchConfig>,
}

struct Dispatched {
    record: RunRecord,
    handle: TaskHandle,
    tier: SubmitTier,
}

impl JobQueuer {
    /// Creates a queuer.
    #[must_use]
    pub fn new(ports: DispatchPorts, config: Arc<DispatchConfig>) -> Self {
        Self { ports, config }
    }

    async fn submit_with_fallback(
        &self,
        job: &JobSnapshot,
        run_id: Uuid,
        decision: &RoutingDecision,
    ) -> Result<(TaskHandle, SubmitTier), QueueError> {
        let payload = json!({
            "job_id": job.job_id.to_string(),
            "run_id": run_id.to_string(),
            "override_payload": null,
        });

        let mut last_error = None;
        for routing in fallback_tiers(decision) {
            let tier = routing.tier();
            let submission = TaskSubmission {
                task_name: self.config.task_name.clone(),
                payload: payload.clone(),
                routing,
                retry: decision.retry,
            };
            match self.ports.queue.submit(submission).await {
                Ok(handle) => return Ok((handle, tier)),
                Err(e) => {
                    warn!(
                        job = %job.job_name,
                        tier = %tier,
                        error = %e,
                        "Submission failed, falling back"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            QueueError::new(decision.task_queue.clone(), "no submission tier attempted")
        }))
    }

    async fn dispatch(
        &self,
        job: &JobSnapshot,
        trigger_type: TriggerType,
        host: &str,
    ) -> Result<Dispatched, DispatchError> {
        let decision = job.routing.as_ref().ok_or_else(|| {
            DispatchError::Internal(format!("job {} has no routing decision", job.job_id))
        })?;
        let record = self.ports.runs.create(job.job_id, trigger_type, host).await?;
        let (handle, tier) = self.submit_with_fallback(job, record.id, decision).await?;
        Ok(Dispatched {
            record,
            handle,
            tier,
        })
    }
}

#[async_trait]
impl Node for JobQueuer {
    fn name(&self) -> &str {
        NodeKind::Queuer.node_name()
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        let trigger_type = ctx.trigger_type;
        let host = ctx
            .execution_host(&self.config.default_execution_host)
            .to_string();

        let mut total_queued = 0;
        let mut last_run_update_failures = 0;
        let mut queue_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut details = Vec::new();
        let mut undeliverable = Vec::new();

        for bucket in Bucket::DISPATCHABLE {
            let jobs = ctx
                .routed_jobs
                .get_mut(&bucket)
                .map(std::mem::take)
                .unwrap_or_default();
            let mut queued = Vec::with_capacity(jobs.len());

            for mut job in jobs {
                let dispatched = match self.dispatch(&job, trigger_type, &host).await {
                    Ok(dispatched) => dispatched,
                    Err(e) => {
                        error!(job_id = %job.job_id, error = %e, "Queueing failed");
                        ctx.push_error(format!("Queue error for {}: {e}", job.job_name));
                        undeliverable.push(job);
                        continue;
                    }
                };

                let queued_at = Utc::now();
                if let Err(e) = self.ports.jobs.update_last_run(job.job_id, queued_at).await {
                    warn!(job_id = %job.job_id, error = %e, "Failed to update last run");
                    last_run_update_failures += 1;
                }

                let (task_queue, routing_key) = job
                    .routing
                    .as_ref()
                    .map(|d| (d.task_queue.clone(), d.routing_key.clone()))
                    .unwrap_or_default();
                *queue_distribution.entry(task_queue.clone()).or_default() += 1;
                details.push(QueuingRecord {
                    job_id: job.job_id,
                    job_name: job.job_name.clone(),
                    run_id: dispatched.record.id,
                    task_id: dispatched.handle.id.clone(),
                    bucket,
                    task_queue,
                    routing_key,
                    tier: dispatched.tier,
                });

                job.dispatch = Some(DispatchReceipt {
                    run_id: dispatched.record.id,
                    task_id: dispatched.handle.id,
                    queued_at,
                });
                total_queued += 1;
                queued.push(job);
            }

            ctx.routed_jobs.insert(bucket, queued);
        }

        let failed_to_queue = undeliverable.len();
        for job in undeliverable {
            ctx.place(Bucket::FailedRouting, job);
        }

        info!(
            queued = total_queued,
            failed = failed_to_queue,
            "JobQueuer finished"
        );

        ctx.execution_stats.queuing = Some(QueuingStats {
            total_queued,
            failed_to_queue,
            last_run_update_failures,
            queue_distribution,
            details,
            queued_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TriggerMetadata;
    use crate::discovery::route_job;
    use crate::ports::MockTaskQueueClient;
    use crate::testing::{InMemoryJobRepository, InMemoryRunRepository, JobFixture, TestPorts};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn routed_context(jobs: Vec<JobSnapshot>) -> PipelineContext {
        let mut ctx = PipelineContext::new(
            TriggerType::Manual,
            TriggerMetadata::new().with_execution_host("worker-7"),
        );
        ctx.reset_buckets();
        for mut job in jobs {
            let decision = route_job(&job, 100).unwrap();
            let bucket = decision.bucket;
            job.routing = Some(decision);
            ctx.place(bucket, job);
        }
        ctx
    }

    fn queuer(ports: DispatchPorts) -> JobQueuer {
        JobQueuer::new(ports, Arc::new(DispatchConfig::default()))
    }

    #[tokio::test]
    async fn test_queues_every_dispatchable_job() {
        let ports = TestPorts::new();
        let jobs = vec![
            JobFixture::anomaly("a").payload("severity", json!("high")).build(),
            JobFixture::monitoring("m").build(),
            JobFixture::fetch_data("f").build(),
        ];
        for job in &jobs {
            ports.jobs.insert(job.clone());
        }
        let mut ctx = routed_context(jobs);

        queuer(ports.ports()).process(&mut ctx).await.unwrap();

        let stats = ctx.execution_stats.queuing.clone().unwrap();
        assert_eq!(stats.total_queued, 3);
        assert_eq!(stats.failed_to_queue, 0);
        assert_eq!(stats.queue_distribution.get("geospatial"), Some(&1));
        assert_eq!(stats.queue_distribution.get("monitoring"), Some(&1));
        assert_eq!(stats.queue_distribution.get("data_processing"), Some(&1));
        assert!(stats.details.iter().all(|d| d.tier == SubmitTier::Explicit));

        let receipt = ctx.bucket(Bucket::HighPriority)[0].dispatch.clone().unwrap();
        assert!(receipt.task_id.starts_with("task-"));

        let records = ports.runs.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.execution_host == "worker-7"));
        assert!(records.iter().all(|r| r.triggered_by == TriggerType::Manual));
        assert_eq!(ports.jobs.last_run_updates().len(), 3);
        assert!(!ctx.has_errors());

        let accepted = ports.queue.accepted();
        assert_eq!(accepted[0].task_name, "tasks.job_processor.process_geospatial_job");
        assert_eq!(accepted[0].payload["override_payload"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_fallback_to_default_queue_records_no_error() {
        let job = JobFixture::anomaly("a").build();
        let jobs = Arc::new(InMemoryJobRepository::new());
        jobs.insert(job.clone());

        let mut queue = MockTaskQueueClient::new();
        let mut seq = Sequence::new();
        queue
            .expect_submit()
            .withf(|s| s.routing.tier() == SubmitTier::Explicit)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueueError::new("geospatial", "exchange missing")));
        queue
            .expect_submit()
            .withf(|s| s.routing.tier() == SubmitTier::QueueOnly)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QueueError::new("geospatial", "queue missing")));
        queue
            .expect_submit()
            .withf(|s| s.routing == SubmitRouting::Default && s.retry.interval_step == 30)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(TaskHandle {
                    id: "task-default".to_string(),
                })
            });

        let ports = DispatchPorts::new(jobs, Arc::new(InMemoryRunRepository::new()), Arc::new(queue));
        let mut ctx = routed_context(vec![job]);

        queuer(ports).process(&mut ctx).await.unwrap();

        assert!(!ctx.has_errors());
        assert!(ctx.bucket(Bucket::FailedRouting).is_empty());
        let queued = &ctx.bucket(Bucket::NormalPriority)[0];
        assert_eq!(queued.dispatch.as_ref().unwrap().task_id, "task-default");
        let stats = ctx.execution_stats.queuing.as_ref().unwrap();
        assert_eq!(stats.total_queued, 1);
        assert_eq!(stats.details[0].tier, SubmitTier::Default);
    }

    #[tokio::test]
    async fn test_all_tiers_failing_moves_job_to_failed_routing() {
        let ports = TestPorts::new();
        let doomed = JobFixture::fetch_data("doomed").build();
        let fine = JobFixture::fetch_data("fine").build();
        ports.jobs.insert(doomed.clone());
        ports.jobs.insert(fine.clone());
        ports.queue.fail_job(doomed.job_id);
        let mut ctx = routed_context(vec![doomed, fine]);

        queuer(ports.ports()).process(&mut ctx).await.unwrap();

        assert_eq!(ctx.bucket(Bucket::NormalPriority).len(), 1);
        assert_eq!(ctx.bucket(Bucket::NormalPriority)[0].job_name, "fine");
        assert_eq!(ctx.bucket(Bucket::FailedRouting)[0].job_name, "doomed");
        assert_eq!(ctx.routed_total(), 2);
        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.errors()[0].starts_with("Queue error for doomed: "));
        assert_eq!(ports.queue.attempts().len(), 4);

        let stats = ctx.execution_stats.queuing.as_ref().unwrap();
        assert_eq!(stats.total_queued, 1);
        assert_eq!(stats.failed_to_queue, 1);
    }

    #[tokio::test]
    async fn test_run_record_failure_is_per_job() {
        let ports = TestPorts::new();
        ports.runs.fail_creates("runs table locked");
        let mut ctx = routed_context(vec![JobFixture::fetch_data("f").build()]);

        queuer(ports.ports()).process(&mut ctx).await.unwrap();

        assert!(ports.queue.attempts().is_empty());
        assert_eq!(ctx.bucket(Bucket::FailedRouting).len(), 1);
        assert!(ctx.errors()[0].contains("runs table locked"));
    }

    #[tokio::test]
    async fn test_last_run_update_failure_keeps_job_queued() {
        let ports = TestPorts::new();
        ports.jobs.fail_last_run_updates();
        let mut ctx = routed_context(vec![JobFixture::fetch_data("f").build()]);

        queuer(ports.ports()).process(&mut ctx).await.unwrap();

        assert!(!ctx.has_errors());
        let stats = ctx.execution_stats.queuing.as_ref().unwrap();
        assert_eq!(stats.total_queued, 1);
        assert_eq!(stats.last_run_update_failures, 1);
        assert!(ctx.bucket(Bucket::NormalPriority)[0].dispatch.is_some());
    }

    #[tokio::test]
    async fn test_failed_routing_bucket_is_not_dispatched() {
        let ports = TestPorts::new();
        let mut ctx = routed_context(Vec::new());
        ctx.place(Bucket::FailedRouting, JobFixture::fetch_data("bad").build());

        queuer(ports.ports()).process(&mut ctx).await.unwrap();

        assert!(ports.queue.attempts().is_empty());
        assert_eq!(ctx.bucket(Bucket::FailedRouting).len(), 1);
        assert_eq!(ctx.execution_stats.total_queued(), 0);
    }
}
