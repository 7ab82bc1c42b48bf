//! The outcome of one pipeline run.

use crate::context::PipelineContext;
use crate::errors::DispatchError;
use serde::{Deserialize, Serialize};

/// Everything a caller gets back from `Pipeline::run`.
///
/// A run never fails its caller: fatal problems surface as
/// `success == false` with the partial context preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// True iff no error was recorded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Jobs that passed validation.
    pub jobs_processed: usize,
    /// Jobs accepted by the task queue.
    pub jobs_queued: usize,
    /// Every error recorded during the run, in order.
    pub errors: Vec<String>,
    /// Wall-clock duration.
    pub execution_time_ms: f64,
    /// The final context.
    pub context: PipelineContext,
}

impl PipelineResult {
    /// Result of a run that walked the whole graph.
    #[must_use]
    pub fn completed(context: PipelineContext, execution_time_ms: f64) -> Self {
        let success = !context.has_errors();
        let message = if success {
            "Pipeline completed successfully"
        } else {
            "Pipeline completed with errors"
        };
        Self::build(context, success, message.to_string(), execution_time_ms)
    }

    /// Result of a run aborted by `error`.
    #[must_use]
    pub fn failed(context: PipelineContext, error: &DispatchError, execution_time_ms: f64) -> Self {
        Self::build(
            context,
            false,
            format!("Pipeline failed: {error}"),
            execution_time_ms,
        )
    }

    fn build(context: PipelineContext, success: bool, message: String, execution_time_ms: f64) -> Self {
        Self {
            success,
            message,
            jobs_processed: context.validated_jobs.len(),
            jobs_queued: context.execution_stats.total_queued(),
            errors: context.errors().to_vec(),
            execution_time_ms,
            context,
        }
    }

    /// The compact form returned by the scheduled-trigger worker task.
    #[must_use]
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            success: self.success,
            message: self.message.clone(),
            jobs_processed: self.jobs_processed,
            jobs_queued: self.jobs_queued,
            execution_time_ms: self.execution_time_ms,
        }
    }
}

/// A `PipelineResult` without errors or context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// True iff no error was recorded.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Jobs that passed validation.
    pub jobs_processed: usize,
    /// Jobs accepted by the task queue.
    pub jobs_queued: usize,
    /// Wall-clock duration.
    pub execution_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TriggerMetadata, TriggerType};

    #[test]
    fn test_success_tracks_errors() {
        let ctx = PipelineContext::new(TriggerType::Scheduled, TriggerMetadata::new());
        let result = PipelineResult::completed(ctx.clone(), 1.5);
        assert!(result.success);
        assert_eq!(result.message, "Pipeline completed successfully");

        let mut ctx = ctx;
        ctx.push_error("Job x failed validation: job is disabled");
        let result = PipelineResult::completed(ctx, 1.5);
        assert!(!result.success);
        assert_eq!(result.message, "Pipeline completed with errors");
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_failed_and_summary() {
        let ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        let err = DispatchError::Timeout(30);
        let result = PipelineResult::failed(ctx, &err, 30_000.0);

        assert!(!result.success);
        assert!(result.message.starts_with("Pipeline failed: "));
        let summary = result.summary();
        assert_eq!(summary.jobs_queued, 0);
        assert_eq!(summary.message, result.message);
        assert_eq!(summary.execution_time_ms, 30_000.0);
    }
}
