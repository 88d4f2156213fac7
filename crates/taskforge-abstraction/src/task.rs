//! Task and result types for agent execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Execution style for an agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Bounded think/act/observe loop against the tool registry.
    React,
    /// Delegates the plan to the workflow graph engine.
    MultiAgent,
    /// ReAct pass with an optional human validation round.
    HumanInLoop,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::React => write!(f, "react"),
            AgentType::MultiAgent => write!(f, "multi_agent"),
            AgentType::HumanInLoop => write!(f, "human_in_loop"),
        }
    }
}

/// A unit of work handed to the agent executor.
///
/// Tasks are immutable once built; everything the execution produces lands
/// in the matching [`AgentResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id.
    pub id: Uuid,
    /// Natural-language request text.
    pub query: String,
    /// How this task should be executed.
    pub agent_type: AgentType,
    /// Memory key consulted before execution.
    pub context_key: String,
    /// Memory key the result is stored under.
    pub result_key: String,
    /// Upper bound on ReAct loop iterations.
    pub max_steps: u32,
    /// Tool names this task may invoke. Empty means no tools.
    pub tools_allowed: Vec<String>,
    /// Free-form parameters passed through to the backend boundary.
    pub parameters: HashMap<String, Value>,
}

impl Task {
    /// Creates a task with defaults: ReAct execution, 10 steps, fresh
    /// context/result keys derived from the task id.
    pub fn new(query: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            query: query.into(),
            agent_type: AgentType::React,
            context_key: format!("context:{id}"),
            result_key: format!("result:{id}"),
            max_steps: 10,
            tools_allowed: Vec::new(),
            parameters: HashMap::new(),
        }
    }

    /// Sets the agent type.
    #[must_use]
    pub fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    /// Sets the step bound for the ReAct loop.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the allowed tool names.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_allowed = tools;
        self
    }

    /// Sets a task parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// One tool invocation made during a ReAct loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Tool that was invoked.
    pub tool: String,
    /// Input handed to the tool.
    pub tool_input: Value,
    /// Value the tool produced (structured errors included).
    pub result: Value,
    /// When the invocation completed.
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Id of the task this result belongs to.
    pub task_id: Uuid,
    /// Whether the task completed successfully.
    pub success: bool,
    /// Final answer text.
    pub output: String,
    /// Reasoning steps in order of production.
    pub thoughts: Vec<String>,
    /// Tool invocations in order of execution.
    pub actions: Vec<ActionRecord>,
    /// Execution metrics (time, model path, backend-reported values).
    pub metrics: HashMap<String, Value>,
    /// Error message when `success` is false.
    pub error: Option<String>,
}

impl AgentResult {
    /// Creates a successful result with no thoughts or actions yet.
    pub fn success(task_id: Uuid, output: impl Into<String>) -> Self {
        Self {
            task_id,
            success: true,
            output: output.into(),
            thoughts: Vec::new(),
            actions: Vec::new(),
            metrics: HashMap::new(),
            error: None,
        }
    }

    /// Creates a failed result carrying the error message.
    pub fn failure(task_id: Uuid, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            task_id,
            success: false,
            output: format!("Error executing task: {error}"),
            thoughts: Vec::new(),
            actions: Vec::new(),
            metrics: HashMap::new(),
            error: Some(error),
        }
    }
}
