//! Core domain model types for geodispatch.
//!
//! This module contains the fundamental types threaded through the pipeline:
//! - Trigger, job type, schedule type and satellite enums
//! - Job snapshots and their free-form payloads
//! - Routing decisions, buckets and priorities
//! - Task retry parameters

mod job;
mod retry;
mod routing;
mod status;
mod trigger;

pub use job::{DispatchReceipt, JobPayload, JobSnapshot, PayloadFieldError, RetryPolicy};
pub use retry::RetryParams;
pub use routing::{Bucket, Priority, RoutingDecision};
pub use status::{JobType, SatelliteType, ScheduleType};
pub use trigger::{EventCriteria, TriggerMetadata, TriggerType};
