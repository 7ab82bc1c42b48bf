//! Summary statistics derived from the earlier stages.

use crate::context::{success_rate, PipelineContext, SummaryStats};
use crate::core::Bucket;
use crate::errors::DispatchError;
use crate::nodes::Node;
use crate::pipeline::NodeKind;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Derives `SummaryStats` from the context. Never touches the jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats;

impl JobStats {
    /// Computes the summary for the current state of `ctx`.
    #[must_use]
    pub fn summarize(ctx: &PipelineContext) -> SummaryStats {
        let discovered = ctx.eligible_jobs.len();
        let validated = ctx.validated_jobs.len();
        let failed = ctx.bucket(Bucket::FailedRouting).len();
        let routed = ctx.dispatchable_total();

        SummaryStats {
            trigger_type: ctx.trigger_type,
            completed_at: Utc::now(),
            total_errors: ctx.errors().len(),
            jobs_discovered: discovered,
            jobs_validated: validated,
            jobs_routed: routed,
            jobs_failed_routing: failed,
            validation_success_rate: success_rate(validated, discovered),
            routing_success_rate: success_rate(routed, validated),
            bucket_distribution: ctx.bucket_distribution(),
        }
    }
}

#[async_trait]
impl Node for JobStats {
    fn name(&self) -> &str {
        NodeKind::StatsCollector.node_name()
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        let summary = Self::summarize(ctx);
        info!(
            discovered = summary.jobs_discovered,
            validated = summary.jobs_validated,
            routed = summary.jobs_routed,
            failed_routing = summary.jobs_failed_routing,
            queued = ctx.execution_stats.total_queued(),
            errors = summary.total_errors,
            "Pipeline summary"
        );
        ctx.execution_stats.summary = Some(summary);
        Ok(())
    }
}
