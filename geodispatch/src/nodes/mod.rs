//! Node trait and execution wrapper.
//!
//! Nodes are the units of work in a dispatch pipeline. Each one reads and
//! updates the shared `PipelineContext`; a node that can pick its own
//! successors at runtime also implements `RouterNode`.

mod result;

pub use result::{NodeRun, NodeStatus};

use crate::context::PipelineContext;
use crate::errors::DispatchError;
use crate::pipeline::NodeKind;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use tracing::{error, info};

/// Trait for pipeline nodes.
///
/// `process` must only fail for infrastructure problems. Business-level
/// outcomes (a rejected job, an unroutable job) are recorded on the context.
#[async_trait]
pub trait Node: Send + Sync + Debug {
    /// Returns the name of the node.
    fn name(&self) -> &str;

    /// Processes the context in place.
    async fn process(&self, ctx: &mut PipelineContext) -> Result<(), DispatchError>;

    /// Returns the router capability, if the node has one.
    fn as_router(&self) -> Option<&dyn RouterNode> {
        None
    }
}

/// A node whose successors are computed from the context.
pub trait RouterNode: Node {
    /// Returns the nodes to run next, in order.
    ///
    /// An empty list defers to the pipeline's static connections.
    fn route(&self, ctx: &PipelineContext) -> Vec<NodeKind>;
}

/// Runs a node with timing and failure recording.
///
/// On failure the error is appended to the context as `"<node>: <message>"`
/// and returned as `DispatchError::NodeFailed`; the caller must not record it
/// again.
///
/// # Errors
///
/// Returns `DispatchError::NodeFailed` if the node's `process` fails.
pub async fn execute(node: &dyn Node, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
    let started_at = Utc::now();
    info!(node = node.name(), run_id = %ctx.run_id, "Executing node");

    match node.process(ctx).await {
        Ok(()) => {
            let run = NodeRun::completed(node.name(), started_at);
            info!(
                node = node.name(),
                duration_ms = run.duration_ms(),
                "Node completed successfully"
            );
            ctx.node_runs.push(run);
            Ok(())
        }
        Err(e) => {
            let message = e.to_string();
            error!(node = node.name(), error = %message, "Node failed");
            ctx.push_error(format!("{}: {}", node.name(), message));
            ctx.node_runs
                .push(NodeRun::failed(node.name(), started_at, message.clone()));
            Err(DispatchError::node_failed(node.name(), message))
        }
    }
}
