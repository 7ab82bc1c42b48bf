//! Pipeline graph specifications.

use crate::errors::DispatchError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The node types a dispatch pipeline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Selects eligible jobs.
    Scanner,
    /// Filters out jobs that are not ready.
    Validator,
    /// Assigns buckets and queue parameters.
    Router,
    /// Submits routed jobs to the task queue.
    Queuer,
    /// Derives summary statistics.
    StatsCollector,
}

impl NodeKind {
    /// The name the node reports and errors are prefixed with.
    #[must_use]
    pub const fn node_name(self) -> &'static str {
        match self {
            Self::Scanner => "JobScanner",
            Self::Validator => "JobValidator",
            Self::Router => "JobRouter",
            Self::Queuer => "JobQueuer",
            Self::StatsCollector => "JobStats",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

/// Configuration for one node in a pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// The node.
    pub kind: NodeKind,
    /// Static successors, run in order.
    #[serde(default)]
    pub connections: Vec<NodeKind>,
    /// Whether the node computes its successors at runtime.
    #[serde(default)]
    pub is_router: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl NodeConfig {
    /// Creates a node config with no connections.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            connections: Vec::new(),
            is_router: false,
            description: String::new(),
        }
    }

    /// Sets the static successors.
    #[must_use]
    pub fn with_connections(mut self, connections: impl IntoIterator<Item = NodeKind>) -> Self {
        self.connections = connections.into_iter().collect();
        self
    }

    /// Marks the node as a router.
    #[must_use]
    pub fn router(mut self) -> Self {
        self.is_router = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A statically declared node graph with a designated start node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSchema {
    /// Pipeline name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Where execution begins.
    pub start: NodeKind,
    /// Node declarations.
    pub nodes: Vec<NodeConfig>,
}

impl PipelineSchema {
    /// Creates a schema with no nodes.
    #[must_use]
    pub fn new(name: impl Into<String>, start: NodeKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            start,
            nodes: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares a node.
    #[must_use]
    pub fn node(mut self, config: NodeConfig) -> Self {
        self.nodes.push(config);
        self
    }

    /// Returns the declaration for a node.
    #[must_use]
    pub fn config(&self, kind: NodeKind) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.kind == kind)
    }

    /// Returns the static successors of a node.
    #[must_use]
    pub fn connections(&self, kind: NodeKind) -> &[NodeKind] {
        self.config(kind).map_or(&[], |c| c.connections.as_slice())
    }

    /// Validates the schema.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::GraphDefinition` if the name is blank, a node
    /// is declared twice, the start node or a connection target is
    /// undeclared, or the static connections form a cycle.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.name.trim().is_empty() {
            return Err(DispatchError::GraphDefinition(
                "pipeline name cannot be empty or whitespace-only".to_string(),
            ));
        }

        let mut declared = HashSet::new();
        for node in &self.nodes {
            if !declared.insert(node.kind) {
                return Err(DispatchError::GraphDefinition(format!(
                    "node {} declared more than once",
                    node.kind
                )));
            }
        }

        if !declared.contains(&self.start) {
            return Err(DispatchError::GraphDefinition(format!(
                "start node {} is not declared",
                self.start
            )));
        }

        for node in &self.nodes {
            if let Some(missing) = node.connections.iter().find(|c| !declared.contains(*c)) {
                return Err(DispatchError::GraphDefinition(format!(
                    "node {} connects to undeclared node {}",
                    node.kind, missing
                )));
            }
        }

        if let Some(cycle) = self.find_cycle() {
            let path: Vec<_> = cycle.iter().map(|k| k.node_name()).collect();
            return Err(DispatchError::GraphDefinition(format!(
                "cycle detected: {}",
                path.join(" -> ")
            )));
        }

        Ok(())
    }

    /// One line per node: name, router flag, successors and description.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("{} (start: {})", self.name, self.start)];
        for node in &self.nodes {
            let next: Vec<_> = node.connections.iter().map(|k| k.node_name()).collect();
            let marker = if node.is_router { " [router]" } else { "" };
            lines.push(format!(
                "  {}{} -> [{}] {}",
                node.kind,
                marker,
                next.join(", "),
                node.description
            ));
        }
        lines.join("\n")
    }

    fn find_cycle(&self) -> Option<Vec<NodeKind>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            kind: NodeKind,
            schema: &PipelineSchema,
            marks: &mut HashMap<NodeKind, Mark>,
            path: &mut Vec<NodeKind>,
        ) -> Option<Vec<NodeKind>> {
            match marks.get(&kind) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|k| *k == kind).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(kind);
                    return Some(cycle);
                }
                None => {}
            }

            marks.insert(kind, Mark::Visiting);
            path.push(kind);
            for next in schema.connections(kind) {
                if let Some(cycle) = visit(*next, schema, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(kind, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut path = Vec::new();
        self.nodes
            .iter()
            .find_map(|node| visit(node.kind, self, &mut marks, &mut path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> PipelineSchema {
        PipelineSchema::new("test", NodeKind::Scanner)
            .node(NodeConfig::new(NodeKind::Scanner).with_connections([NodeKind::Validator]))
            .node(NodeConfig::new(NodeKind::Validator))
    }

    #[test]
    fn test_valid_schema() {
        let schema = linear();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.connections(NodeKind::Scanner), &[NodeKind::Validator]);
        assert!(schema.connections(NodeKind::Validator).is_empty());
        assert!(schema.connections(NodeKind::Queuer).is_empty());
    }

    #[test]
    fn test_blank_name_rejected() {
        let mut schema = linear();
        schema.name = "   ".to_string();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_undeclared_start_rejected() {
        let schema = PipelineSchema::new("test", NodeKind::Router)
            .node(NodeConfig::new(NodeKind::Scanner));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("start node JobRouter"));
    }

    #[test]
    fn test_undeclared_connection_rejected() {
        let schema = PipelineSchema::new("test", NodeKind::Scanner)
            .node(NodeConfig::new(NodeKind::Scanner).with_connections([NodeKind::Queuer]));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let schema = linear().node(NodeConfig::new(NodeKind::Scanner));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let schema = PipelineSchema::new("test", NodeKind::Scanner)
            .node(NodeConfig::new(NodeKind::Scanner).with_connections([NodeKind::Validator]))
            .node(NodeConfig::new(NodeKind::Validator).with_connections([NodeKind::Scanner]));
        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("JobScanner -> JobValidator -> JobScanner"));
    }

    #[test]
    fn test_describe_marks_routers() {
        let schema = PipelineSchema::new("test", NodeKind::Router).node(
            NodeConfig::new(NodeKind::Router)
                .router()
                .with_description("routes"),
        );
        let text = schema.describe();
        assert!(text.contains("JobRouter [router]"));
        assert!(text.contains("routes"));
    }
}
