//! Wave-based workflow executor.

use super::graph::{resolve_mapping, resolve_path, NodeConfig, WorkflowGraph, WorkflowNode};
use super::state::WorkflowState;
use crate::error::{ToolError, WorkflowError};
use crate::tools::ToolRegistry;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use taskforge_abstraction::{Agent, Task};
use tracing::{debug, error, info};
use uuid::Uuid;

/// What to do when a node fails and no FAILURE edge handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeFailurePolicy {
    /// Store `{"error": ...}` as the node's result and keep going; ALWAYS
    /// edges out of the failed node still fire.
    #[default]
    Continue,
    /// Abort the whole execution with `WorkflowError::NodeFailed`.
    FailFast,
}

/// Final output of one workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub workflow_id: Uuid,
    pub completed: bool,
    /// Every executed node's stored result.
    pub results: HashMap<String, Value>,
    /// `results` restricted to END node ids.
    pub end_nodes: HashMap<String, Value>,
}

/// Executes validated workflow graphs wave by wave.
///
/// Each iteration snapshots the frontier, runs every pending node in it
/// concurrently, then merges the outputs back into the state before
/// computing the next frontier. Nodes inside one wave never see each
/// other's results.
pub struct WorkflowExecutor {
    agents: HashMap<String, Arc<dyn Agent>>,
    tools: Arc<ToolRegistry>,
    policy: NodeFailurePolicy,
}

impl WorkflowExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { agents: HashMap::new(), tools, policy: NodeFailurePolicy::default() }
    }

    /// Registers an agent for AGENT node dispatch.
    #[must_use]
    pub fn with_agent(mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(name.into(), agent);
        self
    }

    /// Sets the unhandled-node-failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: NodeFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs a workflow from its START node until the frontier drains.
    ///
    /// The loop ends when the frontier is empty or contains only END
    /// nodes; END nodes left in the final frontier are not executed.
    ///
    /// # Errors
    /// `WorkflowError::Validation` if the graph fails validation (nothing
    /// executes), or `WorkflowError::NodeFailed` under the fail-fast
    /// policy.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        initial_context: HashMap<String, Value>,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let errors = graph.validate();
        if !errors.is_empty() {
            return Err(WorkflowError::Validation(errors));
        }
        let start = graph
            .start_node
            .clone()
            .ok_or_else(|| WorkflowError::Validation(vec!["Workflow must have a start node".to_string()]))?;

        let mut state = WorkflowState::new(start, initial_context);
        info!(
            workflow = %graph.name,
            workflow_id = %state.workflow_id,
            "Starting workflow execution"
        );

        while !state.current_nodes.is_empty()
            && !state.current_nodes.iter().all(|id| graph.end_nodes.contains(id))
        {
            let mut snapshot: Vec<String> = state.current_nodes.drain().collect();
            snapshot.sort_unstable();

            let pending: Vec<&WorkflowNode> = snapshot
                .iter()
                .filter(|id| !state.completed_nodes.contains(*id))
                .filter_map(|id| graph.nodes.get(id))
                .collect();

            let state_ref = &state;
            let wave = pending.iter().map(|node| async move {
                (node.id.clone(), self.run_node(node, state_ref).await)
            });
            let outcomes = join_all(wave).await;

            for (node_id, outcome) in outcomes {
                match outcome {
                    Ok(result) => {
                        let next = graph.next_nodes(&node_id, Some(&result));
                        debug!(node = %node_id, next = ?next, "Node completed");
                        state.results.insert(node_id.clone(), result);
                        state.completed_nodes.insert(node_id);
                        state.current_nodes.extend(next);
                    }
                    Err(message) => {
                        error!(node = %node_id, error = %message, "Node execution failed");
                        let failure_targets = graph.failure_targets(&node_id);
                        if !failure_targets.is_empty() {
                            state.current_nodes.extend(failure_targets);
                        } else if self.policy == NodeFailurePolicy::FailFast {
                            return Err(WorkflowError::NodeFailed { node_id, message });
                        } else {
                            let marker = json!({ "error": message });
                            let next = graph.next_nodes(&node_id, Some(&marker));
                            state.results.insert(node_id.clone(), marker);
                            state.completed_nodes.insert(node_id);
                            state.current_nodes.extend(next);
                        }
                    }
                }
            }
            state.touch();
        }

        let end_nodes: HashMap<String, Value> = graph
            .end_nodes
            .iter()
            .filter_map(|id| state.results.get(id).map(|v| (id.clone(), v.clone())))
            .collect();

        info!(
            workflow_id = %state.workflow_id,
            executed = state.completed_nodes.len(),
            "Workflow execution completed"
        );

        Ok(WorkflowOutcome {
            workflow_id: state.workflow_id,
            completed: true,
            results: state.results,
            end_nodes,
        })
    }

    async fn run_node(&self, node: &WorkflowNode, state: &WorkflowState) -> Result<Value, String> {
        debug!(node = %node.id, node_type = %node.node_type(), "Processing node");
        match &node.config {
            NodeConfig::Start => Ok(json!({ "status": "started" })),
            NodeConfig::End => Ok(json!({ "status": "completed", "results": state.results })),
            NodeConfig::Agent(cfg) => {
                let agent = self
                    .agents
                    .get(&cfg.agent_name)
                    .ok_or_else(|| format!("Agent '{}' not found in registry", cfg.agent_name))?;

                let mut parameters: HashMap<String, Value> = state.context.clone();
                parameters.extend(cfg.parameters.clone());
                for mapping in &cfg.input_mappings {
                    parameters
                        .insert(mapping.target_key.clone(), resolve_mapping(mapping, &state.results));
                }

                let mut task = Task::new(&cfg.query)
                    .with_agent_type(cfg.agent_type)
                    .with_max_steps(cfg.max_steps)
                    .with_tools(cfg.tools_allowed.clone());
                task.parameters = parameters;

                let result = agent.execute(task).await;
                let result_value =
                    serde_json::to_value(&result).map_err(|e| e.to_string())?;

                let mut output = Map::new();
                output.insert("success".to_string(), json!(result.success));
                output.insert("output".to_string(), result_value.clone());
                for mapping in &cfg.output_mappings {
                    let value = resolve_path(&result_value, &mapping.source_key);
                    if !value.is_null() {
                        output.insert(mapping.target_key.clone(), value);
                    }
                }
                Ok(Value::Object(output))
            }
            NodeConfig::Tool(cfg) => {
                let mut arguments = cfg.arguments.clone();
                for mapping in &cfg.input_mappings {
                    arguments
                        .insert(mapping.target_key.clone(), resolve_mapping(mapping, &state.results));
                }

                match self.tools.execute_tool_checked(&cfg.tool_name, Value::Object(arguments)).await
                {
                    Ok(value) => Ok(value),
                    // A missing or forbidden tool is a graph configuration
                    // problem; timeouts and tool failures are recoverable
                    // data per the registry's contract.
                    Err(err @ (ToolError::NotFound(_) | ToolError::NotAllowed(_))) => {
                        Err(err.to_string())
                    }
                    Err(err) => Ok(json!({ "error": err.to_string() })),
                }
            }
            NodeConfig::Conditional { predicate } => {
                let predicate = predicate
                    .as_ref()
                    .ok_or_else(|| format!("Conditional node '{}' has no predicate attached", node.id))?;
                Ok(json!({ "result": predicate(&state.context) }))
            }
            NodeConfig::Map { input_key, input_mappings, map_fn } => {
                let map_fn = map_fn
                    .as_ref()
                    .ok_or_else(|| format!("Map node '{}' has no map function attached", node.id))?;
                let input = resolve_node_input(input_key, input_mappings, state)?;
                let Value::Array(items) = input else {
                    return Err(format!("Map node '{}' input is not an array", node.id));
                };
                let results: Vec<Value> =
                    items.iter().map(|item| map_fn(item, &state.context)).collect();
                Ok(json!({ "results": results }))
            }
            NodeConfig::Reduce { input_key, input_mappings, initial_value, reduce_fn } => {
                let reduce_fn = reduce_fn.as_ref().ok_or_else(|| {
                    format!("Reduce node '{}' has no reduce function attached", node.id)
                })?;
                let input = resolve_node_input(input_key, input_mappings, state)?;
                let Value::Array(items) = input else {
                    return Err(format!("Reduce node '{}' input is not an array", node.id));
                };
                let mut accumulator = initial_value.clone();
                for item in &items {
                    accumulator = reduce_fn(accumulator, item, &state.context);
                }
                Ok(json!({ "result": accumulator }))
            }
            NodeConfig::Merge { input_mappings } => {
                let mut merged = Map::new();
                for mapping in input_mappings {
                    merged.insert(mapping.target_key.clone(), resolve_mapping(mapping, &state.results));
                }
                Ok(Value::Object(merged))
            }
        }
    }
}

/// Resolves the input array for MAP/REDUCE nodes from the mapping whose
/// target matches the node's `input_key`.
fn resolve_node_input(
    input_key: &str,
    input_mappings: &[super::graph::InputMapping],
    state: &WorkflowState,
) -> Result<Value, String> {
    input_mappings
        .iter()
        .find(|mapping| mapping.target_key == input_key)
        .map(|mapping| resolve_mapping(mapping, &state.results))
        .ok_or_else(|| format!("No input mapping targets '{input_key}'"))
}
