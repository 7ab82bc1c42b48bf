//! Context management for pipeline execution.
//!
//! This module provides:
//! - The per-run `PipelineContext` threaded through every node
//! - Typed execution statistics, one slot per stage

#[cfg(test)]
mod context_tests;
mod pipeline_context;
mod stats;

pub use pipeline_context::{PipelineContext, CONTEXT_VERSION};
pub use stats::{
    success_rate, ExecutionStats, QueuingRecord, QueuingStats, RoutingRecord, RoutingStats,
    ScanMethod, ScanStats, SummaryStats, ValidationStats,
};
