//! Test support for dispatch pipelines.
//!
//! This module provides:
//! - Builders for valid jobs of every type
//! - In-memory repositories, a scripted task queue and a static health probe

mod fixtures;
mod mocks;

pub use fixtures::{coordinates, JobFixture};
pub use mocks::{
    InMemoryJobRepository, InMemoryRunRepository, ScriptedTaskQueue, StaticHealthProbe,
};

use crate::ports::DispatchPorts;
use std::sync::Arc;

/// In-memory collaborators, kept alongside the `DispatchPorts` built from them.
#[derive(Debug, Clone, Default)]
pub struct TestPorts {
    /// Job store.
    pub jobs: Arc<InMemoryJobRepository>,
    /// Run store.
    pub runs: Arc<InMemoryRunRepository>,
    /// Task queue.
    pub queue: Arc<ScriptedTaskQueue>,
    /// Health probe.
    pub health: Arc<StaticHealthProbe>,
}

impl TestPorts {
    /// Creates empty, healthy collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the jobs in the job repository.
    #[must_use]
    pub fn with_jobs(self, jobs: impl IntoIterator<Item = crate::core::JobSnapshot>) -> Self {
        for job in jobs {
            self.jobs.insert(job);
        }
        self
    }

    /// Builds the ports handed to a pipeline.
    #[must_use]
    pub fn ports(&self) -> DispatchPorts {
        DispatchPorts::new(self.jobs.clone(), self.runs.clone(), self.queue.clone())
            .with_health(self.health.clone())
    }
}
