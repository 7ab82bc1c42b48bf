//! Job selection keyed on the trigger type.

use crate::context::{PipelineContext, ScanMethod, ScanStats};
use crate::core::{JobSnapshot, JobType, TriggerType};
use crate::errors::DispatchError;
use crate::nodes::Node;
use crate::pipeline::NodeKind;
use crate::ports::DispatchPorts;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Fills `eligible_jobs` from the job repository.
///
/// Repository failures propagate and abort the run.
#[derive(Debug, Clone)]
pub struct JobScanner {
    ports: DispatchPorts,
}

impl JobScanner {
    /// Creates a scanner over the job repository in `ports`.
    #[must_use]
    pub fn new(ports: DispatchPorts) -> Self {
        Self { ports }
    }

    async fn scan(&self, ctx: &PipelineContext) -> Result<(ScanMethod, Vec<JobSnapshot>), DispatchError> {
        let jobs = &self.ports.jobs;
        match ctx.trigger_type {
            TriggerType::Scheduled => {
                let mut found = jobs.get_eligible(TriggerType::Scheduled, &Map::new()).await?;
                let before = found.len();
                found.retain(|job| job.enabled);
                if found.len() < before {
                    debug!(dropped = before - found.len(), "Dropped disabled jobs from scheduled scan");
                }
                Ok((ScanMethod::ScheduledJobs, found))
            }
            TriggerType::Api => {
                let filters = ctx.trigger_metadata.filters();
                let found = jobs.get_eligible(TriggerType::Api, &filters).await?;
                Ok((ScanMethod::ApiFiltered, found))
            }
            TriggerType::Manual => {
                let found = match ctx.trigger_metadata.job_id()? {
                    Some(job_id) => jobs.get_by_id(job_id).await?.into_iter().collect(),
                    None => jobs.get_enabled().await?,
                };
                Ok((ScanMethod::ManualSelection, found))
            }
            TriggerType::Event => {
                let criteria = ctx.trigger_metadata.event_criteria();
                let found = match (criteria.event_type.as_deref(), criteria.polygon_id) {
                    (Some("anomaly_detected"), _) => {
                        jobs.get_by_type(JobType::AnomalyDetection).await?
                    }
                    (Some("data_quality_alert"), _) => jobs.get_by_type(JobType::Monitoring).await?,
                    (Some("polygon_updated"), Some(polygon_id)) => {
                        let mut search = Map::new();
                        search.insert("polygon_id".to_string(), Value::String(polygon_id));
                        jobs.search_by_payload(&search).await?
                    }
                    _ => jobs.get_enabled().await?,
                };
                Ok((ScanMethod::EventDriven, found))
            }
        }
    }
}

#[async_trait]
impl Node for JobScanner {
    fn name(&self) -> &str {
        NodeKind::Scanner.node_name()
    }

    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        let (method, found) = self.scan(ctx).await?;

        info!(
            trigger_type = ctx.trigger_type.as_str(),
            method = ?method,
            jobs = found.len(),
            "JobScanner found eligible jobs"
        );

        ctx.execution_stats.scan = Some(ScanStats {
            method,
            jobs_scanned: found.len(),
            scanned_at: Utc::now(),
        });
        ctx.eligible_jobs = found;
        Ok(())
    }
}
