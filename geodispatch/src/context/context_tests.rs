//! Tests for the pipeline context.

#[cfg(test)]
mod tests {
    use crate::context::{PipelineContext, CONTEXT_VERSION};
    use crate::core::{Bucket, JobSnapshot, JobType, TriggerMetadata, TriggerType};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn job(name: &str) -> JobSnapshot {
        JobSnapshot::new(name, JobType::FetchData, "run_fetch")
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        assert_eq!(ctx.version, CONTEXT_VERSION);
        assert!(ctx.eligible_jobs.is_empty());
        assert!(ctx.validated_jobs.is_empty());
        assert!(ctx.routed_jobs.is_empty());
        assert!(!ctx.has_errors());
        assert_eq!(ctx.routed_total(), 0);
    }

    #[test]
    fn test_runs_get_distinct_ids() {
        let a = PipelineContext::new(TriggerType::Api, TriggerMetadata::new());
        let b = PipelineContext::new(TriggerType::Api, TriggerMetadata::new());
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_errors_are_append_only() {
        let mut ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        ctx.push_error("first");
        ctx.extend_errors(vec!["second".to_string(), "third".to_string()]);
        assert_eq!(ctx.errors(), &["first", "second", "third"]);
    }

    #[test]
    fn test_reset_buckets_creates_all() {
        let mut ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        ctx.place(Bucket::Monitoring, job("stale"));
        ctx.reset_buckets();
        assert_eq!(ctx.routed_jobs.len(), Bucket::ALL.len());
        assert!(ctx.routed_jobs.values().all(Vec::is_empty));
    }

    #[test]
    fn test_bucket_counts() {
        let mut ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        ctx.reset_buckets();
        ctx.place(Bucket::HighPriority, job("a"));
        ctx.place(Bucket::HighPriority, job("b"));
        ctx.place(Bucket::FailedRouting, job("c"));

        assert_eq!(ctx.routed_total(), 3);
        assert_eq!(ctx.dispatchable_total(), 2);
        assert_eq!(ctx.bucket(Bucket::HighPriority).len(), 2);
        assert!(ctx.bucket(Bucket::BatchProcessing).is_empty());

        let expected: BTreeMap<Bucket, usize> = [
            (Bucket::HighPriority, 2),
            (Bucket::NormalPriority, 0),
            (Bucket::BatchProcessing, 0),
            (Bucket::Monitoring, 0),
            (Bucket::FailedRouting, 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(ctx.bucket_distribution(), expected);
    }

    #[test]
    fn test_bucket_on_missing_key_is_empty() {
        let ctx = PipelineContext::new(TriggerType::Manual, TriggerMetadata::new());
        assert!(ctx.bucket(Bucket::Monitoring).is_empty());
    }

    #[test]
    fn test_execution_host_prefers_metadata() {
        let ctx = PipelineContext::new(
            TriggerType::Api,
            TriggerMetadata::new().with_execution_host("api-7"),
        );
        assert_eq!(ctx.execution_host("fallback"), "api-7");

        let ctx = PipelineContext::new(TriggerType::Api, TriggerMetadata::new());
        assert_eq!(ctx.execution_host("fallback"), "fallback");
    }

    #[test]
    fn test_context_serializes_with_bucket_names() {
        let mut ctx = PipelineContext::new(TriggerType::Event, TriggerMetadata::new());
        ctx.reset_buckets();
        let value = serde_json::to_value(&ctx).unwrap();
        assert!(value["routed_jobs"].get("failed_routing").is_some());
        assert_eq!(value["trigger_type"], "event");
    }
}
