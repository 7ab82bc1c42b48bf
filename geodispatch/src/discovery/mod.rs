//! The job discovery pipeline: scan, validate, route, queue, summarize.

mod queuer;
mod router;
mod scanner;
mod stats;
mod validator;

pub use queuer::{fallback_tiers, JobQueuer};
pub use router::{
    estimate_duration, is_batch, priority_for, retry_params_for, route_job, task_queue_for,
    JobRouter,
};
pub use scanner::JobScanner;
pub use stats::JobStats;
pub use validator::{check_payload, check_rate_limit, JobValidator, Rejection};

use crate::config::DispatchConfig;
use crate::nodes::Node;
use crate::pipeline::{NodeConfig, NodeKind, PipelineSchema};
use crate::ports::DispatchPorts;
use std::sync::Arc;

/// Registered name of the job discovery pipeline.
pub const JOB_DISCOVERY: &str = "job_discovery";

/// The discovery graph: scanner, validator and router in a line, then the
/// router's runtime choice of queuer and stats collector.
#[must_use]
pub fn job_discovery_schema() -> PipelineSchema {
    PipelineSchema::new(JOB_DISCOVERY, NodeKind::Scanner)
        .with_description("Discovers eligible jobs and dispatches them to the task queue")
        .node(
            NodeConfig::new(NodeKind::Scanner)
                .with_connections([NodeKind::Validator])
                .with_description("Selects eligible jobs for the trigger"),
        )
        .node(
            NodeConfig::new(NodeKind::Validator)
                .with_connections([NodeKind::Router])
                .with_description("Drops jobs that are not ready to run"),
        )
        .node(
            NodeConfig::new(NodeKind::Router)
                .router()
                .with_connections([NodeKind::Queuer, NodeKind::StatsCollector])
                .with_description("Assigns buckets, priorities and queues"),
        )
        .node(
            NodeConfig::new(NodeKind::Queuer)
                .with_description("Creates run records and submits tasks"),
        )
        .node(
            NodeConfig::new(NodeKind::StatsCollector)
                .with_description("Summarizes the run"),
        )
}

/// Builds the node for `kind`, wired to `ports` and `config`.
#[must_use]
pub fn build_node(
    kind: NodeKind,
    ports: &DispatchPorts,
    config: &Arc<DispatchConfig>,
) -> Box<dyn Node> {
    match kind {
        NodeKind::Scanner => Box::new(JobScanner::new(ports.clone())),
        NodeKind::Validator => Box::new(JobValidator::new(ports.clone(), config.clone())),
        NodeKind::Router => Box::new(JobRouter::new(config.clone())),
        NodeKind::Queuer => Box::new(JobQueuer::new(ports.clone(), config.clone())),
        NodeKind::StatsCollector => Box::new(JobStats),
    }
}
