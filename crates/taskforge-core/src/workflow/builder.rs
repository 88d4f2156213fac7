//! Convenience builder for workflow graphs.

use super::graph::{
    AgentNodeConfig, ContextPredicate, EdgeCondition, EdgePredicate, InputMapping, MapFn,
    NodeConfig, ReduceFn, ToolNodeConfig, WorkflowEdge, WorkflowGraph, WorkflowNode,
};
use crate::error::WorkflowError;
use serde_json::{Map, Value};
use taskforge_abstraction::AgentType;

/// Builds a [`WorkflowGraph`] with `start` and `end` nodes pre-wired.
///
/// Node ids `"start"` and `"end"` are reserved by the builder.
#[derive(Debug)]
pub struct WorkflowBuilder {
    graph: WorkflowGraph,
}

impl WorkflowBuilder {
    /// Starts a new graph containing a START node (`"start"`) and an END
    /// node (`"end"`).
    pub fn new(name: impl Into<String>) -> Self {
        let mut graph = WorkflowGraph::new(name);
        // A fresh graph cannot already hold start/end nodes.
        let _ = graph.add_node(WorkflowNode::new("start", "Start", NodeConfig::Start));
        let _ = graph.add_node(WorkflowNode::new("end", "End", NodeConfig::End));
        Self { graph }
    }

    /// Adds an arbitrary node.
    ///
    /// # Errors
    /// Propagates graph-build errors such as a duplicate START node.
    pub fn node(mut self, node: WorkflowNode) -> Result<Self, WorkflowError> {
        self.graph.add_node(node)?;
        Ok(self)
    }

    /// Adds an AGENT node dispatching to the named agent.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn agent_node(
        self,
        id: impl Into<String>,
        agent_name: impl Into<String>,
        agent_type: AgentType,
        query: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Agent(AgentNodeConfig {
            agent_name: agent_name.into(),
            query: query.into(),
            agent_type,
            max_steps: 10,
            tools_allowed: Vec::new(),
            parameters: Default::default(),
            input_mappings: Vec::new(),
            output_mappings: Vec::new(),
        });
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Adds a TOOL node.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn tool_node(
        self,
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Tool(ToolNodeConfig {
            tool_name: tool_name.into(),
            arguments,
            input_mappings: Vec::new(),
        });
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Adds a CONDITIONAL node with its predicate attached.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn conditional_node(
        self,
        id: impl Into<String>,
        predicate: ContextPredicate,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Conditional { predicate: Some(predicate) };
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Adds a MAP node.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn map_node(
        self,
        id: impl Into<String>,
        input_key: impl Into<String>,
        input_mappings: Vec<InputMapping>,
        map_fn: MapFn,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Map {
            input_key: input_key.into(),
            input_mappings,
            map_fn: Some(map_fn),
        };
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Adds a REDUCE node.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn reduce_node(
        self,
        id: impl Into<String>,
        input_key: impl Into<String>,
        input_mappings: Vec<InputMapping>,
        initial_value: Value,
        reduce_fn: ReduceFn,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Reduce {
            input_key: input_key.into(),
            input_mappings,
            initial_value,
            reduce_fn: Some(reduce_fn),
        };
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Adds a MERGE node collecting the given mappings.
    ///
    /// # Errors
    /// Propagates graph-build errors.
    pub fn merge_node(
        self,
        id: impl Into<String>,
        input_mappings: Vec<InputMapping>,
    ) -> Result<Self, WorkflowError> {
        let id = id.into();
        let config = NodeConfig::Merge { input_mappings };
        self.node(WorkflowNode::new(id.clone(), id, config))
    }

    /// Connects two nodes with an ALWAYS edge.
    ///
    /// # Errors
    /// `WorkflowError::UnknownNode` if either endpoint is absent.
    pub fn connect(
        self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        self.connect_on(source, target, EdgeCondition::Always)
    }

    /// Connects two nodes with the given edge condition.
    ///
    /// # Errors
    /// `WorkflowError::UnknownNode` if either endpoint is absent.
    pub fn connect_on(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        condition: EdgeCondition,
    ) -> Result<Self, WorkflowError> {
        self.graph.add_edge(WorkflowEdge::new(source, target).with_condition(condition))?;
        Ok(self)
    }

    /// Connects two nodes with a CUSTOM edge and its predicate.
    ///
    /// # Errors
    /// `WorkflowError::UnknownNode` if either endpoint is absent.
    pub fn connect_when(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        predicate: EdgePredicate,
    ) -> Result<Self, WorkflowError> {
        self.graph.add_edge(WorkflowEdge::new(source, target).with_predicate(predicate))?;
        Ok(self)
    }

    /// Finishes the build and returns the graph.
    pub fn build(self) -> WorkflowGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_prewires_start_and_end() {
        let graph = WorkflowBuilder::new("w").build();
        assert_eq!(graph.start_node.as_deref(), Some("start"));
        assert!(graph.end_nodes.contains("end"));
    }

    #[test]
    fn test_builder_assembles_valid_graph() {
        let mut args = Map::new();
        args.insert("expression".to_string(), json!("1 + 1"));
        let graph = WorkflowBuilder::new("calc")
            .tool_node("add", "calculator", args)
            .unwrap()
            .connect("start", "add")
            .unwrap()
            .connect("add", "end")
            .unwrap()
            .build();
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn test_builder_rejects_unknown_edge_endpoint() {
        let err = WorkflowBuilder::new("w").connect("start", "ghost").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownNode(id) if id == "ghost"));
    }
}
