//! Logging setup and run spans.

mod logging;

pub use logging::{build_filter, init_logging};

use crate::core::TriggerType;
use tracing::{info_span, Span};
use uuid::Uuid;

/// The span every log line of one pipeline run is nested under.
#[must_use]
pub fn run_span(pipeline: &str, run_id: Uuid, trigger_type: TriggerType) -> Span {
    info_span!(
        "pipeline_run",
        pipeline = pipeline,
        run_id = %run_id,
        trigger_type = trigger_type.as_str()
    )
}
