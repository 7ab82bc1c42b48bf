//! Walks a pipeline graph over one context.

use super::{NodeKind, PipelineResult, PipelineSchema};
use crate::config::DispatchConfig;
use crate::context::PipelineContext;
use crate::core::{TriggerMetadata, TriggerType};
use crate::discovery::{build_node, job_discovery_schema};
use crate::errors::DispatchError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::nodes::{self, Node};
use crate::observability::run_span;
use crate::ports::DispatchPorts;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

/// Upper bound on node executions in one run.
pub const MAX_NODE_EXECUTIONS: usize = 64;

/// Creates the node instance for a kind. Called at most once per kind per run.
pub type NodeFactory = Arc<dyn Fn(NodeKind) -> Box<dyn Node> + Send + Sync>;

/// A runnable pipeline: a validated schema plus the means to build its nodes.
///
/// `run` may be called concurrently; each call gets its own context and its
/// own node instances.
#[derive(Clone)]
pub struct Pipeline {
    schema: Arc<PipelineSchema>,
    factory: NodeFactory,
    config: Arc<DispatchConfig>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.schema.name)
            .field("start", &self.schema.start)
            .finish_non_exhaustive()
    }
}

/// Per-run walk state.
struct Walk {
    instances: HashMap<NodeKind, Arc<dyn Node>>,
    executions: usize,
}

impl Pipeline {
    /// Creates a pipeline from a schema and a node factory.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::GraphDefinition` if the schema is invalid.
    pub fn new(
        schema: PipelineSchema,
        factory: NodeFactory,
        config: Arc<DispatchConfig>,
    ) -> Result<Self, DispatchError> {
        schema.validate()?;
        Ok(Self {
            schema: Arc::new(schema),
            factory,
            config,
            events: Arc::new(NoOpEventSink),
        })
    }

    /// The job discovery pipeline wired to `ports`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::GraphDefinition` if the schema is invalid.
    pub fn job_discovery(
        ports: DispatchPorts,
        config: Arc<DispatchConfig>,
    ) -> Result<Self, DispatchError> {
        Self::with_discovery_nodes(job_discovery_schema(), ports, config)
    }

    /// A pipeline over `schema` whose nodes are the discovery nodes.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::GraphDefinition` if the schema is invalid.
    pub fn with_discovery_nodes(
        schema: PipelineSchema,
        ports: DispatchPorts,
        config: Arc<DispatchConfig>,
    ) -> Result<Self, DispatchError> {
        let node_config = config.clone();
        let factory: NodeFactory = Arc::new(move |kind| build_node(kind, &ports, &node_config));
        Self::new(schema, factory, config)
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &PipelineSchema {
        &self.schema
    }

    /// Runs the pipeline for a trigger.
    ///
    /// Never fails: node errors, timeouts and graph problems all come back as
    /// an unsuccessful `PipelineResult` carrying the partial context.
    pub async fn run(
        &self,
        trigger_type: TriggerType,
        trigger_metadata: TriggerMetadata,
    ) -> PipelineResult {
        let ctx = PipelineContext::new(trigger_type, trigger_metadata);
        let span = run_span(&self.schema.name, ctx.run_id, trigger_type);
        self.run_context(ctx).instrument(span).await
    }

    async fn run_context(&self, mut ctx: PipelineContext) -> PipelineResult {
        let started = Instant::now();
        let run_id = ctx.run_id;
        info!(pipeline = %self.schema.name, "Pipeline started");
        self.events
            .emit(&PipelineEvent::PipelineStarted {
                run_id,
                pipeline: self.schema.name.clone(),
                trigger_type: ctx.trigger_type.as_str().to_string(),
            })
            .await;

        let mut walk = Walk {
            instances: HashMap::new(),
            executions: 0,
        };
        let start = self.schema.start;
        let outcome = match self.config.run_timeout() {
            Some(limit) => {
                match tokio::time::timeout(limit, self.walk(start, &mut ctx, &mut walk)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(DispatchError::Timeout(limit.as_secs())),
                }
            }
            None => self.walk(start, &mut ctx, &mut walk).await,
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(()) => {
                let result = PipelineResult::completed(ctx, elapsed_ms);
                info!(
                    success = result.success,
                    jobs_processed = result.jobs_processed,
                    jobs_queued = result.jobs_queued,
                    errors = result.errors.len(),
                    execution_time_ms = elapsed_ms,
                    "Pipeline completed"
                );
                self.events
                    .emit(&PipelineEvent::PipelineCompleted {
                        run_id,
                        success: result.success,
                        jobs_queued: result.jobs_queued,
                        error_count: result.errors.len(),
                        duration_ms: millis(elapsed_ms),
                    })
                    .await;
                result
            }
            Err(e) => {
                if !e.is_recorded_by_node() {
                    ctx.push_error(e.to_string());
                }
                error!(error = %e, execution_time_ms = elapsed_ms, "Pipeline execution failed");
                self.events
                    .emit(&PipelineEvent::PipelineFailed {
                        run_id,
                        error: e.to_string(),
                    })
                    .await;
                PipelineResult::failed(ctx, &e, elapsed_ms)
            }
        }
    }

    fn walk<'a>(
        &'a self,
        kind: NodeKind,
        ctx: &'a mut PipelineContext,
        state: &'a mut Walk,
    ) -> BoxFuture<'a, Result<(), DispatchError>> {
        async move {
            state.executions += 1;
            if state.executions > MAX_NODE_EXECUTIONS {
                return Err(DispatchError::GraphDefinition(format!(
                    "more than {MAX_NODE_EXECUTIONS} node executions, stopped at {kind}"
                )));
            }

            let node = state
                .instances
                .entry(kind)
                .or_insert_with(|| Arc::from((self.factory)(kind)))
                .clone();

            self.run_node(node.as_ref(), ctx).await?;

            let next = self.successors(kind, node.as_ref(), ctx)?;
            for next_kind in next {
                self.walk(next_kind, ctx, state).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn run_node(&self, node: &dyn Node, ctx: &mut PipelineContext) -> Result<(), DispatchError> {
        let run_id = ctx.run_id;
        self.events
            .emit(&PipelineEvent::NodeStarted {
                run_id,
                node: node.name().to_string(),
            })
            .await;

        let started = Instant::now();
        match nodes::execute(node, ctx).await {
            Ok(()) => {
                self.events
                    .emit(&PipelineEvent::NodeCompleted {
                        run_id,
                        node: node.name().to_string(),
                        duration_ms: millis(started.elapsed().as_secs_f64() * 1000.0),
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                self.events
                    .emit(&PipelineEvent::NodeFailed {
                        run_id,
                        node: node.name().to_string(),
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Router nodes choose at runtime; an empty choice or a plain node
    /// follows the static connections.
    fn successors(
        &self,
        kind: NodeKind,
        node: &dyn Node,
        ctx: &PipelineContext,
    ) -> Result<Vec<NodeKind>, DispatchError> {
        let declared_router = self.schema.config(kind).is_some_and(|c| c.is_router);
        let routed = match node.as_router() {
            Some(router) => router.route(ctx),
            None => {
                if declared_router {
                    warn!(node = %kind, "Node is declared a router but cannot route");
                }
                Vec::new()
            }
        };

        if routed.is_empty() {
            return Ok(self.schema.connections(kind).to_vec());
        }
        if let Some(unknown) = routed.iter().find(|k| self.schema.config(**k).is_none()) {
            return Err(DispatchError::GraphDefinition(format!(
                "{kind} routed to undeclared node {unknown}"
            )));
        }
        Ok(routed)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(ms: f64) -> u64 {
    ms.max(0.0) as u64
}
