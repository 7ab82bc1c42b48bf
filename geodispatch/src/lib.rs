//! # Geodispatch
//!
//! Discovery and dispatch of geospatial processing jobs.
//!
//! A run walks a small node graph over one fresh `PipelineContext`:
//!
//! - **Scan**: select candidate jobs for the trigger (scheduled, api, manual, event)
//! - **Validate**: drop disabled, malformed, rate-limited or blocked jobs
//! - **Route**: assign a priority, a bucket and a worker queue to each job
//! - **Queue**: record a run and submit a task, falling back through three tiers
//! - **Stats**: summarize the run
//!
//! Individual job failures never abort a run; they are recorded as errors on
//! the context and surface in the final `PipelineResult`.
//!
//! ## Quick Start
//!
//! ```rust
//! use geodispatch::prelude::*;
//! use geodispatch::testing::{JobFixture, TestPorts};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let ports = TestPorts::new().with_jobs([JobFixture::anomaly("flood-watch").build()]);
//! let pipeline = Pipeline::job_discovery(ports.ports(), Arc::new(DispatchConfig::default()))?;
//!
//! let result = pipeline.run(TriggerType::Manual, TriggerMetadata::new()).await;
//! assert!(result.success);
//! assert_eq!(result.jobs_queued, 1);
//! # Ok::<(), DispatchError>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod nodes;
pub mod observability;
pub mod pipeline;
pub mod ports;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DispatchConfig, LogFormat, LoggingConfig};
    pub use crate::context::{ExecutionStats, PipelineContext, SummaryStats};
    pub use crate::core::{
        Bucket, EventCriteria, JobPayload, JobSnapshot, JobType, Priority, RoutingDecision,
        SatelliteType, ScheduleType, TriggerMetadata, TriggerType,
    };
    pub use crate::errors::{ConfigError, DispatchError, QueueError, RepositoryError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::nodes::{Node, RouterNode};
    pub use crate::observability::init_logging;
    pub use crate::pipeline::{Pipeline, PipelineRegistry, PipelineResult, PipelineSummary};
    pub use crate::ports::{
        DispatchPorts, HealthProbe, JobRepository, RunRepository, TaskQueueClient,
    };
    pub use crate::utils::{iso_timestamp, Timestamp};
}
