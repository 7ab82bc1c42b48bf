//! Trigger types and trigger metadata.

use crate::errors::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// A scheduler tick.
    #[serde(alias = "cron")]
    Scheduled,
    /// A REST API request.
    Api,
    /// An operator action.
    Manual,
    /// A domain event.
    Event,
}

impl TriggerType {
    /// Returns the wire name of the trigger, as recorded on run records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Api => "api",
            Self::Manual => "manual",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" | "cron" => Ok(Self::Scheduled),
            "api" => Ok(Self::Api),
            "manual" => Ok(Self::Manual),
            "event" => Ok(Self::Event),
            other => Err(DispatchError::InvalidTrigger(format!(
                "unknown trigger type '{other}'"
            ))),
        }
    }
}

/// Trigger-specific parameters.
///
/// The map stays opaque so callers can pass anything through to the run
/// record; the accessors cover the keys the pipeline itself reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerMetadata(Map<String, Value>);

impl TriggerMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing map.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Sets an arbitrary key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Sets the API filter map.
    #[must_use]
    pub fn with_filters(self, filters: Map<String, Value>) -> Self {
        self.with("filters", Value::Object(filters))
    }

    /// Targets a single job for a manual trigger.
    #[must_use]
    pub fn with_job_id(self, job_id: Uuid) -> Self {
        self.with("job_id", Value::String(job_id.to_string()))
    }

    /// Sets the event criteria for an event trigger.
    #[must_use]
    pub fn with_event_criteria(self, criteria: &EventCriteria) -> Self {
        self.with("event_criteria", Value::Object(criteria.to_map()))
    }

    /// Sets the execution host recorded on run records.
    #[must_use]
    pub fn with_execution_host(self, host: impl Into<String>) -> Self {
        self.with("execution_host", Value::String(host.into()))
    }

    /// Returns a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the API filter map, empty if absent or not an object.
    #[must_use]
    pub fn filters(&self) -> Map<String, Value> {
        self.0
            .get("filters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the targeted job id, if one was supplied.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidTrigger` if `job_id` is present but is
    /// not a UUID string.
    pub fn job_id(&self) -> Result<Option<Uuid>, DispatchError> {
        match self.0.get("job_id") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s).map(Some).map_err(|e| {
                DispatchError::InvalidTrigger(format!("job_id '{s}' is not a valid UUID: {e}"))
            }),
            Some(other) => Err(DispatchError::InvalidTrigger(format!(
                "job_id must be a string, got {other}"
            ))),
        }
    }

    /// Returns the event criteria, empty if absent.
    #[must_use]
    pub fn event_criteria(&self) -> EventCriteria {
        self.0
            .get("event_criteria")
            .and_then(Value::as_object)
            .map(EventCriteria::from_map)
            .unwrap_or_default()
    }

    /// Returns the execution host, if supplied.
    #[must_use]
    pub fn execution_host(&self) -> Option<&str> {
        self.0.get("execution_host").and_then(Value::as_str)
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Parameters of a domain event trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCriteria {
    /// The event type, e.g. `anomaly_detected`.
    pub event_type: Option<String>,
    /// The polygon a `polygon_updated` event refers to.
    pub polygon_id: Option<String>,
    /// Any other criteria, passed through untouched.
    pub extra: Map<String, Value>,
}

impl EventCriteria {
    /// Creates criteria for an event type.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..Self::default()
        }
    }

    /// Sets the polygon id.
    #[must_use]
    pub fn with_polygon_id(mut self, polygon_id: impl Into<String>) -> Self {
        self.polygon_id = Some(polygon_id.into());
        self
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let mut extra = map.clone();
        let event_type = extra
            .remove("event_type")
            .and_then(|v| v.as_str().map(String::from));
        // Polygon ids arrive as strings or bare integers.
        let polygon_id = extra.remove("polygon_id").and_then(|v| match v {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self {
            event_type,
            polygon_id,
            extra,
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        if let Some(ref event_type) = self.event_type {
            map.insert("event_type".to_string(), Value::String(event_type.clone()));
        }
        if let Some(ref polygon_id) = self.polygon_id {
            map.insert("polygon_id".to_string(), Value::String(polygon_id.clone()));
        }
        map
    }
}
