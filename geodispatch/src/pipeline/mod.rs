//! Pipeline graphs and their execution.
//!
//! This module provides:
//! - Graph schemas with static connections and router nodes
//! - The executor that walks a schema over one context
//! - The registry that maps triggers to pipelines

mod executor;
mod registry;
mod result;
mod spec;


pub use executor::{NodeFactory, Pipeline, MAX_NODE_EXECUTIONS};
pub use registry::PipelineRegistry;
pub use result::{PipelineResult, PipelineSummary};
pub use spec::{NodeConfig, NodeKind, PipelineSchema};
