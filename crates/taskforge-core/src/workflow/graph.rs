//! Workflow graph data structure and validation.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use taskforge_abstraction::AgentType;

/// Node kinds understood by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    End,
    Agent,
    Tool,
    Conditional,
    Map,
    Reduce,
    Merge,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Agent => "agent",
            Self::Tool => "tool",
            Self::Conditional => "conditional",
            Self::Map => "map",
            Self::Reduce => "reduce",
            Self::Merge => "merge",
        };
        f.write_str(s)
    }
}

/// Condition attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    /// The edge always activates.
    Always,
    /// Activates only when the source result carries `"success": true`.
    Success,
    /// Activates only when the source result carries `"success": false`.
    Failure,
    /// Activates when the attached predicate returns true. Predicates are
    /// not serializable; hosts re-attach them after deserialization.
    Custom,
}

/// Predicate over the execution context, used by CONDITIONAL nodes.
pub type ContextPredicate = Arc<dyn Fn(&HashMap<String, Value>) -> bool + Send + Sync>;

/// Predicate over `{"result": ...}`, used by CUSTOM edges.
pub type EdgePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Per-element transform for MAP nodes.
pub type MapFn = Arc<dyn Fn(&Value, &HashMap<String, Value>) -> Value + Send + Sync>;

/// Fold step for REDUCE nodes: (accumulator, element, context) -> accumulator.
pub type ReduceFn = Arc<dyn Fn(Value, &Value, &HashMap<String, Value>) -> Value + Send + Sync>;

/// Pulls a value out of an upstream node's stored result into a named slot.
///
/// `source_key` is a dotted path into the upstream result; the literal
/// `"output"` means the whole result. A path that does not resolve yields
/// `null` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMapping {
    pub source_node: String,
    #[serde(default = "default_source_key")]
    pub source_key: String,
    pub target_key: String,
}

fn default_source_key() -> String {
    "output".to_string()
}

impl InputMapping {
    pub fn new(
        source_node: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            source_node: source_node.into(),
            source_key: source_key.into(),
            target_key: target_key.into(),
        }
    }
}

/// Re-exposes part of a node's own result under a top-level key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapping {
    #[serde(default = "default_source_key")]
    pub source_key: String,
    pub target_key: String,
}

/// Configuration for an AGENT node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNodeConfig {
    /// Registry name of the agent to dispatch to.
    pub agent_name: String,
    pub query: String,
    pub agent_type: AgentType,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub tools_allowed: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub input_mappings: Vec<InputMapping>,
    #[serde(default)]
    pub output_mappings: Vec<OutputMapping>,
}

fn default_max_steps() -> u32 {
    10
}

/// Configuration for a TOOL node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNodeConfig {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub input_mappings: Vec<InputMapping>,
}

/// Typed per-variant node configuration.
///
/// The variant fixes the node type, so a node can never carry a config that
/// does not match its kind. Function members (predicates, map/reduce
/// closures) are optional because they cannot be serialized; a deserialized
/// graph carries `None` until the host re-attaches them.
#[derive(Clone)]
pub enum NodeConfig {
    Start,
    End,
    Agent(AgentNodeConfig),
    Tool(ToolNodeConfig),
    Conditional {
        predicate: Option<ContextPredicate>,
    },
    Map {
        input_key: String,
        input_mappings: Vec<InputMapping>,
        map_fn: Option<MapFn>,
    },
    Reduce {
        input_key: String,
        input_mappings: Vec<InputMapping>,
        initial_value: Value,
        reduce_fn: Option<ReduceFn>,
    },
    Merge {
        input_mappings: Vec<InputMapping>,
    },
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Agent(cfg) => f.debug_tuple("Agent").field(cfg).finish(),
            Self::Tool(cfg) => f.debug_tuple("Tool").field(cfg).finish(),
            Self::Conditional { predicate } => f
                .debug_struct("Conditional")
                .field("has_predicate", &predicate.is_some())
                .finish(),
            Self::Map { input_key, map_fn, .. } => f
                .debug_struct("Map")
                .field("input_key", input_key)
                .field("has_map_fn", &map_fn.is_some())
                .finish(),
            Self::Reduce { input_key, reduce_fn, .. } => f
                .debug_struct("Reduce")
                .field("input_key", input_key)
                .field("has_reduce_fn", &reduce_fn.is_some())
                .finish(),
            Self::Merge { input_mappings } => {
                f.debug_struct("Merge").field("input_mappings", input_mappings).finish()
            }
        }
    }
}

impl NodeConfig {
    /// The node type this configuration belongs to.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Start => NodeType::Start,
            Self::End => NodeType::End,
            Self::Agent(_) => NodeType::Agent,
            Self::Tool(_) => NodeType::Tool,
            Self::Conditional { .. } => NodeType::Conditional,
            Self::Map { .. } => NodeType::Map,
            Self::Reduce { .. } => NodeType::Reduce,
            Self::Merge { .. } => NodeType::Merge,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Start | Self::End => json!({}),
            Self::Agent(cfg) => serde_json::to_value(cfg).unwrap_or_else(|_| json!({})),
            Self::Tool(cfg) => serde_json::to_value(cfg).unwrap_or_else(|_| json!({})),
            Self::Conditional { predicate } => {
                json!({ "has_predicate": predicate.is_some() })
            }
            Self::Map { input_key, input_mappings, map_fn } => json!({
                "input_key": input_key,
                "input_mappings": input_mappings,
                "has_map_fn": map_fn.is_some(),
            }),
            Self::Reduce { input_key, input_mappings, initial_value, reduce_fn } => json!({
                "input_key": input_key,
                "input_mappings": input_mappings,
                "initial_value": initial_value,
                "has_reduce_fn": reduce_fn.is_some(),
            }),
            Self::Merge { input_mappings } => json!({ "input_mappings": input_mappings }),
        }
    }

    fn from_value(node_type: NodeType, config: &Value) -> Result<Self, WorkflowError> {
        let parse_mappings = |v: &Value| -> Vec<InputMapping> {
            v.get("input_mappings")
                .and_then(|m| serde_json::from_value(m.clone()).ok())
                .unwrap_or_default()
        };
        match node_type {
            NodeType::Start => Ok(Self::Start),
            NodeType::End => Ok(Self::End),
            NodeType::Agent => {
                let cfg = serde_json::from_value(config.clone())
                    .map_err(|e| WorkflowError::InvalidSpec(format!("agent config: {e}")))?;
                Ok(Self::Agent(cfg))
            }
            NodeType::Tool => {
                let cfg = serde_json::from_value(config.clone())
                    .map_err(|e| WorkflowError::InvalidSpec(format!("tool config: {e}")))?;
                Ok(Self::Tool(cfg))
            }
            NodeType::Conditional => Ok(Self::Conditional { predicate: None }),
            NodeType::Map => Ok(Self::Map {
                input_key: config
                    .get("input_key")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                input_mappings: parse_mappings(config),
                map_fn: None,
            }),
            NodeType::Reduce => Ok(Self::Reduce {
                input_key: config
                    .get("input_key")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                input_mappings: parse_mappings(config),
                initial_value: config.get("initial_value").cloned().unwrap_or(Value::Null),
                reduce_fn: None,
            }),
            NodeType::Merge => Ok(Self::Merge { input_mappings: parse_mappings(config) }),
        }
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowNode {
    pub id: String,
    pub name: String,
    pub config: NodeConfig,
    pub metadata: HashMap<String, Value>,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: NodeConfig) -> Self {
        Self { id: id.into(), name: name.into(), config, metadata: HashMap::new() }
    }

    /// The node's type, derived from its configuration variant.
    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }
}

/// A directed edge between two nodes.
#[derive(Clone)]
pub struct WorkflowEdge {
    pub source: String,
    pub target: String,
    pub condition: EdgeCondition,
    pub predicate: Option<EdgePredicate>,
    pub metadata: HashMap<String, Value>,
}

impl fmt::Debug for WorkflowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEdge")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("condition", &self.condition)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl WorkflowEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: EdgeCondition::Always,
            predicate: None,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_condition(mut self, condition: EdgeCondition) -> Self {
        self.condition = condition;
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, predicate: EdgePredicate) -> Self {
        self.condition = EdgeCondition::Custom;
        self.predicate = Some(predicate);
        self
    }

    fn matches(&self, result: Option<&Value>) -> bool {
        match self.condition {
            EdgeCondition::Always => true,
            EdgeCondition::Success => result
                .and_then(|r| r.get("success"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            EdgeCondition::Failure => result
                .and_then(|r| r.get("success"))
                .and_then(Value::as_bool)
                .map(|s| !s)
                .unwrap_or(false),
            EdgeCondition::Custom => match &self.predicate {
                Some(pred) => {
                    let wrapped = json!({ "result": result.cloned().unwrap_or(Value::Null) });
                    pred(&wrapped)
                }
                None => false,
            },
        }
    }
}

/// A directed acyclic workflow graph.
///
/// Built once through [`add_node`](Self::add_node) and
/// [`add_edge`](Self::add_edge), then validated and handed to the executor.
/// The executor never mutates the graph.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    pub name: String,
    pub description: String,
    pub nodes: HashMap<String, WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    pub start_node: Option<String>,
    pub end_nodes: BTreeSet<String>,
}

impl WorkflowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Adds a node to the graph.
    ///
    /// # Errors
    /// Returns `WorkflowError::DuplicateStart` if the graph already has a
    /// START node and another is added.
    pub fn add_node(&mut self, node: WorkflowNode) -> Result<(), WorkflowError> {
        match node.node_type() {
            NodeType::Start => {
                if self.start_node.is_some() {
                    return Err(WorkflowError::DuplicateStart);
                }
                self.start_node = Some(node.id.clone());
            }
            NodeType::End => {
                self.end_nodes.insert(node.id.clone());
            }
            _ => {}
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Adds an edge to the graph.
    ///
    /// # Errors
    /// Returns `WorkflowError::UnknownNode` if either endpoint is not in
    /// the graph.
    pub fn add_edge(&mut self, edge: WorkflowEdge) -> Result<(), WorkflowError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(WorkflowError::UnknownNode(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(WorkflowError::UnknownNode(edge.target));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Targets of edges out of `node_id` whose condition matches `result`.
    pub fn next_nodes(&self, node_id: &str, result: Option<&Value>) -> Vec<String> {
        self.edges
            .iter()
            .filter(|edge| edge.source == node_id && edge.matches(result))
            .map(|edge| edge.target.clone())
            .collect()
    }

    /// Targets of FAILURE edges out of `node_id`, used when a node handler
    /// fails outright.
    pub fn failure_targets(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|edge| edge.source == node_id && edge.condition == EdgeCondition::Failure)
            .map(|edge| edge.target.clone())
            .collect()
    }

    /// Checks structural soundness and returns every problem found.
    ///
    /// An empty vector means the graph is executable. Checks: a START node
    /// exists, at least one END node exists, every node is reachable from
    /// START, and the graph has no cycle.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.start_node.is_none() {
            errors.push("Workflow must have a start node".to_string());
        }
        if self.end_nodes.is_empty() {
            errors.push("Workflow must have at least one end node".to_string());
        }

        if let Some(start) = &self.start_node {
            let mut reachable = BTreeSet::new();
            let mut queue = vec![start.clone()];
            while let Some(current) = queue.pop() {
                if !reachable.insert(current.clone()) {
                    continue;
                }
                for edge in &self.edges {
                    if edge.source == current && !reachable.contains(&edge.target) {
                        queue.push(edge.target.clone());
                    }
                }
            }
            let unreachable: Vec<&str> = {
                let mut ids: Vec<&str> = self
                    .nodes
                    .keys()
                    .filter(|id| !reachable.contains(*id))
                    .map(String::as_str)
                    .collect();
                ids.sort_unstable();
                ids
            };
            if !unreachable.is_empty() {
                errors.push(format!("Unreachable nodes: {}", unreachable.join(", ")));
            }
        }

        if let Some(node_id) = self.find_cycle() {
            errors.push(format!("Cycle detected involving node {node_id}"));
        }

        errors
    }

    /// Iterative three-color DFS cycle check. An explicit stack keeps this
    /// safe on graphs too deep for recursion.
    fn find_cycle(&self) -> Option<String> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        }

        let mut color: HashMap<&str, u8> =
            self.nodes.keys().map(|id| (id.as_str(), WHITE)).collect();
        let mut roots: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        roots.sort_unstable();

        for root in roots {
            if color[root] != WHITE {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
            color.insert(root, GRAY);

            while let Some((node, child_idx)) = stack.last_mut() {
                let child = adjacency.get(node).and_then(|targets| targets.get(*child_idx));
                match child {
                    Some(&target) => {
                        *child_idx += 1;
                        match color.get(target).copied().unwrap_or(WHITE) {
                            WHITE => {
                                color.insert(target, GRAY);
                                stack.push((target, 0));
                            }
                            GRAY => return Some(target.to_string()),
                            _ => {}
                        }
                    }
                    None => {
                        let finished = *node;
                        color.insert(finished, BLACK);
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    /// Serializes the graph to a JSON value.
    ///
    /// Function members (CUSTOM edge predicates, conditional predicates,
    /// map/reduce closures) cannot be serialized; their presence is recorded
    /// as boolean flags and the host must re-attach them after
    /// [`from_value`](Self::from_value).
    pub fn to_value(&self) -> Value {
        let nodes: Map<String, Value> = self
            .nodes
            .iter()
            .map(|(id, node)| {
                (
                    id.clone(),
                    json!({
                        "id": node.id,
                        "type": node.node_type(),
                        "name": node.name,
                        "config": node.config.to_value(),
                        "metadata": node.metadata,
                    }),
                )
            })
            .collect();

        let edges: Vec<Value> = self
            .edges
            .iter()
            .map(|edge| {
                json!({
                    "source": edge.source,
                    "target": edge.target,
                    "condition": edge.condition,
                    "has_condition_func": edge.predicate.is_some(),
                    "metadata": edge.metadata,
                })
            })
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "nodes": nodes,
            "edges": edges,
            "start_node": self.start_node,
            "end_nodes": self.end_nodes,
        })
    }

    /// Rebuilds a graph from its serialized form.
    ///
    /// # Errors
    /// Returns `WorkflowError::InvalidSpec` for malformed input.
    pub fn from_value(data: &Value) -> Result<Self, WorkflowError> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkflowError::InvalidSpec("missing 'name'".to_string()))?;
        let mut graph = Self::new(name);
        graph.description =
            data.get("description").and_then(Value::as_str).unwrap_or_default().to_string();

        let nodes = data
            .get("nodes")
            .and_then(Value::as_object)
            .ok_or_else(|| WorkflowError::InvalidSpec("missing 'nodes'".to_string()))?;
        for (id, node_data) in nodes {
            let node_type: NodeType = node_data
                .get("type")
                .and_then(|t| serde_json::from_value(t.clone()).ok())
                .ok_or_else(|| {
                    WorkflowError::InvalidSpec(format!("node '{id}' has no valid type"))
                })?;
            let config_value = node_data.get("config").cloned().unwrap_or_else(|| json!({}));
            let config = NodeConfig::from_value(node_type, &config_value)?;
            let mut node = WorkflowNode::new(
                id.clone(),
                node_data.get("name").and_then(Value::as_str).unwrap_or(id),
                config,
            );
            if let Some(metadata) = node_data.get("metadata").and_then(Value::as_object) {
                node.metadata = metadata.clone().into_iter().collect();
            }
            graph.add_node(node)?;
        }

        let edges = data
            .get("edges")
            .and_then(Value::as_array)
            .ok_or_else(|| WorkflowError::InvalidSpec("missing 'edges'".to_string()))?;
        for edge_data in edges {
            let source = edge_data
                .get("source")
                .and_then(Value::as_str)
                .ok_or_else(|| WorkflowError::InvalidSpec("edge missing 'source'".to_string()))?;
            let target = edge_data
                .get("target")
                .and_then(Value::as_str)
                .ok_or_else(|| WorkflowError::InvalidSpec("edge missing 'target'".to_string()))?;
            let condition: EdgeCondition = edge_data
                .get("condition")
                .and_then(|c| serde_json::from_value(c.clone()).ok())
                .unwrap_or(EdgeCondition::Always);
            let mut edge = WorkflowEdge::new(source, target).with_condition(condition);
            if let Some(metadata) = edge_data.get("metadata").and_then(Value::as_object) {
                edge.metadata = metadata.clone().into_iter().collect();
            }
            graph.add_edge(edge)?;
        }

        Ok(graph)
    }

    /// Re-attaches a CONDITIONAL node's predicate after deserialization.
    ///
    /// # Errors
    /// `UnknownNode` if the id is absent, `InvalidSpec` if the node is not
    /// a CONDITIONAL node.
    pub fn attach_predicate(
        &mut self,
        node_id: &str,
        predicate: ContextPredicate,
    ) -> Result<(), WorkflowError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| WorkflowError::UnknownNode(node_id.to_string()))?;
        match &mut node.config {
            NodeConfig::Conditional { predicate: slot } => {
                *slot = Some(predicate);
                Ok(())
            }
            _ => Err(WorkflowError::InvalidSpec(format!(
                "node '{node_id}' is not a conditional node"
            ))),
        }
    }

    /// Re-attaches a MAP node's transform after deserialization.
    ///
    /// # Errors
    /// `UnknownNode` or `InvalidSpec` on a type mismatch.
    pub fn attach_map_fn(&mut self, node_id: &str, func: MapFn) -> Result<(), WorkflowError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| WorkflowError::UnknownNode(node_id.to_string()))?;
        match &mut node.config {
            NodeConfig::Map { map_fn, .. } => {
                *map_fn = Some(func);
                Ok(())
            }
            _ => Err(WorkflowError::InvalidSpec(format!("node '{node_id}' is not a map node"))),
        }
    }

    /// Re-attaches a REDUCE node's fold function after deserialization.
    ///
    /// # Errors
    /// `UnknownNode` or `InvalidSpec` on a type mismatch.
    pub fn attach_reduce_fn(&mut self, node_id: &str, func: ReduceFn) -> Result<(), WorkflowError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| WorkflowError::UnknownNode(node_id.to_string()))?;
        match &mut node.config {
            NodeConfig::Reduce { reduce_fn, .. } => {
                *reduce_fn = Some(func);
                Ok(())
            }
            _ => Err(WorkflowError::InvalidSpec(format!("node '{node_id}' is not a reduce node"))),
        }
    }

    /// Re-attaches a CUSTOM edge predicate after deserialization.
    ///
    /// # Errors
    /// `InvalidSpec` if no CUSTOM edge connects the given nodes.
    pub fn attach_edge_predicate(
        &mut self,
        source: &str,
        target: &str,
        predicate: EdgePredicate,
    ) -> Result<(), WorkflowError> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| {
                e.source == source && e.target == target && e.condition == EdgeCondition::Custom
            })
            .ok_or_else(|| {
                WorkflowError::InvalidSpec(format!("no custom edge from '{source}' to '{target}'"))
            })?;
        edge.predicate = Some(predicate);
        Ok(())
    }
}

/// Resolves an [`InputMapping`]'s dotted source path against a result map.
///
/// Returns `Value::Null` when the source node has no stored result or the
/// path does not resolve.
pub(crate) fn resolve_mapping(mapping: &InputMapping, results: &HashMap<String, Value>) -> Value {
    let Some(root) = results.get(&mapping.source_node) else {
        return Value::Null;
    };
    resolve_path(root, &mapping.source_key)
}

pub(crate) fn resolve_path(root: &Value, path: &str) -> Value {
    if path == "output" {
        return root.clone();
    }
    let mut current = root;
    for key in path.split('.') {
        match current.get(key) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_graph() -> WorkflowGraph {
        let mut graph = WorkflowGraph::new("linear");
        graph.add_node(WorkflowNode::new("start", "Start", NodeConfig::Start)).unwrap();
        graph
            .add_node(WorkflowNode::new(
                "work",
                "Work",
                NodeConfig::Tool(ToolNodeConfig {
                    tool_name: "calculator".to_string(),
                    arguments: Map::new(),
                    input_mappings: Vec::new(),
                }),
            ))
            .unwrap();
        graph.add_node(WorkflowNode::new("end", "End", NodeConfig::End)).unwrap();
        graph.add_edge(WorkflowEdge::new("start", "work")).unwrap();
        graph.add_edge(WorkflowEdge::new("work", "end")).unwrap();
        graph
    }

    #[test]
    fn test_valid_graph_passes_validation() {
        assert!(linear_graph().validate().is_empty());
    }

    #[test]
    fn test_second_start_rejected() {
        let mut graph = linear_graph();
        let err = graph
            .add_node(WorkflowNode::new("start2", "Start 2", NodeConfig::Start))
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateStart));
    }

    #[test]
    fn test_edge_to_unknown_node_rejected() {
        let mut graph = linear_graph();
        let err = graph.add_edge(WorkflowEdge::new("work", "ghost")).unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownNode(id) if id == "ghost"));
    }

    #[test]
    fn test_missing_start_and_end_reported() {
        let mut graph = WorkflowGraph::new("empty-ish");
        graph
            .add_node(WorkflowNode::new(
                "lonely",
                "Lonely",
                NodeConfig::Merge { input_mappings: Vec::new() },
            ))
            .unwrap();
        let errors = graph.validate();
        assert!(errors.iter().any(|e| e.contains("start node")));
        assert!(errors.iter().any(|e| e.contains("end node")));
    }

    #[test]
    fn test_unreachable_node_reported() {
        let mut graph = linear_graph();
        graph
            .add_node(WorkflowNode::new(
                "island",
                "Island",
                NodeConfig::Merge { input_mappings: Vec::new() },
            ))
            .unwrap();
        let errors = graph.validate();
        assert!(errors.iter().any(|e| e.contains("Unreachable nodes: island")));
    }

    #[test]
    fn test_cycle_reported() {
        let mut graph = linear_graph();
        graph.add_edge(WorkflowEdge::new("end", "start")).unwrap();
        let errors = graph.validate();
        assert!(errors.iter().any(|e| e.contains("Cycle detected")));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut graph = WorkflowGraph::new("deep");
        graph.add_node(WorkflowNode::new("start", "Start", NodeConfig::Start)).unwrap();
        let mut prev = "start".to_string();
        for i in 0..10_000 {
            let id = format!("n{i}");
            graph
                .add_node(WorkflowNode::new(
                    id.clone(),
                    id.clone(),
                    NodeConfig::Merge { input_mappings: Vec::new() },
                ))
                .unwrap();
            graph.add_edge(WorkflowEdge::new(prev.clone(), id.clone())).unwrap();
            prev = id;
        }
        graph.add_node(WorkflowNode::new("end", "End", NodeConfig::End)).unwrap();
        graph.add_edge(WorkflowEdge::new(prev, "end")).unwrap();
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn test_success_edge_matching() {
        let edge = WorkflowEdge::new("a", "b").with_condition(EdgeCondition::Success);
        assert!(edge.matches(Some(&json!({"success": true}))));
        assert!(!edge.matches(Some(&json!({"success": false}))));
        assert!(!edge.matches(Some(&json!({"other": 1}))));
        assert!(!edge.matches(None));

        let failure = WorkflowEdge::new("a", "b").with_condition(EdgeCondition::Failure);
        assert!(failure.matches(Some(&json!({"success": false}))));
        assert!(!failure.matches(Some(&json!({"success": true}))));
        assert!(!failure.matches(Some(&json!({"other": 1}))));
    }

    #[test]
    fn test_custom_edge_predicate() {
        let edge = WorkflowEdge::new("a", "b").with_predicate(Arc::new(|wrapped: &Value| {
            wrapped["result"]["score"].as_f64().unwrap_or(0.0) > 0.5
        }));
        assert!(edge.matches(Some(&json!({"score": 0.9}))));
        assert!(!edge.matches(Some(&json!({"score": 0.1}))));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut graph = linear_graph();
        graph
            .add_node(WorkflowNode::new(
                "check",
                "Check",
                NodeConfig::Conditional { predicate: Some(Arc::new(|_| true)) },
            ))
            .unwrap();
        graph.add_edge(WorkflowEdge::new("work", "check")).unwrap();
        graph
            .add_edge(WorkflowEdge::new("check", "end").with_predicate(Arc::new(|_| true)))
            .unwrap();

        let serialized = graph.to_value();
        assert_eq!(serialized["edges"][3]["has_condition_func"], json!(true));

        let restored = WorkflowGraph::from_value(&serialized).unwrap();
        assert_eq!(restored.name, graph.name);
        assert_eq!(restored.nodes.len(), graph.nodes.len());
        assert_eq!(restored.edges.len(), graph.edges.len());
        assert_eq!(restored.start_node, graph.start_node);
        assert_eq!(restored.end_nodes, graph.end_nodes);
        // Predicates are dropped by design and must be re-attached.
        let check = &restored.nodes["check"];
        assert!(matches!(&check.config, NodeConfig::Conditional { predicate: None }));
    }

    #[test]
    fn test_attach_predicate_after_deserialization() {
        let mut graph = WorkflowGraph::new("g");
        graph.add_node(WorkflowNode::new("start", "Start", NodeConfig::Start)).unwrap();
        graph
            .add_node(WorkflowNode::new(
                "check",
                "Check",
                NodeConfig::Conditional { predicate: None },
            ))
            .unwrap();
        graph.add_node(WorkflowNode::new("end", "End", NodeConfig::End)).unwrap();

        graph.attach_predicate("check", Arc::new(|_| true)).unwrap();
        assert!(matches!(
            &graph.nodes["check"].config,
            NodeConfig::Conditional { predicate: Some(_) }
        ));

        let err = graph.attach_predicate("start", Arc::new(|_| true)).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidSpec(_)));
    }

    #[test]
    fn test_resolve_dotted_path() {
        let mut results = HashMap::new();
        results.insert("a".to_string(), json!({"output": {"inner": {"x": 7}}, "success": true}));

        let whole = resolve_mapping(&InputMapping::new("a", "output", "t"), &results);
        assert_eq!(whole["success"], json!(true));

        let nested = resolve_mapping(&InputMapping::new("a", "output.inner.x", "t"), &results);
        assert_eq!(nested, json!(7));

        let missing = resolve_mapping(&InputMapping::new("a", "output.nope", "t"), &results);
        assert_eq!(missing, Value::Null);

        let absent_node = resolve_mapping(&InputMapping::new("zzz", "output", "t"), &results);
        assert_eq!(absent_node, Value::Null);
    }
}
