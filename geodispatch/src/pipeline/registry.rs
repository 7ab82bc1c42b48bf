//! Named pipelines and trigger-to-pipeline resolution.

use super::{Pipeline, PipelineSchema};
use crate::config::DispatchConfig;
use crate::core::TriggerType;
use crate::discovery::{job_discovery_schema, JOB_DISCOVERY};
use crate::errors::DispatchError;
use crate::events::{EventSink, NoOpEventSink};
use crate::ports::DispatchPorts;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Resolves which pipeline handles a trigger.
///
/// `job_discovery` is always registered and is the fallback for every
/// trigger type.
#[derive(Clone)]
pub struct PipelineRegistry {
    ports: DispatchPorts,
    config: Arc<DispatchConfig>,
    events: Arc<dyn EventSink>,
    schemas: BTreeMap<String, PipelineSchema>,
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("pipelines", &self.names())
            .finish_non_exhaustive()
    }
}

impl PipelineRegistry {
    /// Creates a registry holding the job discovery pipeline.
    #[must_use]
    pub fn new(ports: DispatchPorts, config: Arc<DispatchConfig>) -> Self {
        let mut schemas = BTreeMap::new();
        schemas.insert(JOB_DISCOVERY.to_string(), job_discovery_schema());
        Self {
            ports,
            config,
            events: Arc::new(NoOpEventSink),
            schemas,
        }
    }

    /// Sets the event sink handed to every pipeline.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Registers a schema under its own name, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::GraphDefinition` if the schema is invalid.
    pub fn register(&mut self, schema: PipelineSchema) -> Result<(), DispatchError> {
        schema.validate()?;
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    /// Registered pipeline names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    /// The pipeline name for a trigger: a registered explicit name wins,
    /// anything else resolves to `job_discovery`.
    #[must_use]
    pub fn resolve_name<'a>(&'a self, _trigger_type: TriggerType, name: Option<&'a str>) -> &'a str {
        match name {
            Some(name) if self.schemas.contains_key(name) => name,
            _ => JOB_DISCOVERY,
        }
    }

    /// Builds the pipeline for a trigger.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownPipeline` if the resolved name has no
    /// schema.
    pub fn get(&self, trigger_type: TriggerType, name: Option<&str>) -> Result<Pipeline, DispatchError> {
        let resolved = self.resolve_name(trigger_type, name);
        let schema = self
            .schemas
            .get(resolved)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownPipeline(resolved.to_string()))?;

        info!(pipeline = resolved, trigger_type = trigger_type.as_str(), "Using pipeline");
        Ok(
            Pipeline::with_discovery_nodes(schema, self.ports.clone(), self.config.clone())?
                .with_event_sink(self.events.clone()),
        )
    }
}
