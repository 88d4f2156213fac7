//! Model configuration and plan types for the inference-backend boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by inference-backend collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendError {
    /// The backend could not produce a plan for the task.
    #[error("Plan generation failed: {0}")]
    PlanGeneration(String),

    /// The backend failed while producing the next action or answer.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The backend is not reachable or not configured.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Supported inference backends.
///
/// The orchestration core never talks to these directly; they only identify
/// which external backend a catalog entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlmBackendType {
    #[serde(rename = "vLLM")]
    Vllm,
    #[serde(rename = "llama.cpp")]
    LlamaCpp,
    #[serde(rename = "MLC-LLM")]
    MlcLlm,
    #[serde(rename = "TensorRT-LLM")]
    TensorRtLlm,
    #[serde(rename = "mock")]
    Mock,
}

impl std::fmt::Display for LlmBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmBackendType::Vllm => write!(f, "vLLM"),
            LlmBackendType::LlamaCpp => write!(f, "llama.cpp"),
            LlmBackendType::MlcLlm => write!(f, "MLC-LLM"),
            LlmBackendType::TensorRtLlm => write!(f, "TensorRT-LLM"),
            LlmBackendType::Mock => write!(f, "mock"),
        }
    }
}

/// Capability flags consulted by the router's scoring pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCapabilities {
    pub handles_complex_tasks: bool,
    pub handles_medium_tasks: bool,
    pub multi_agent_coordination: bool,
    pub human_interaction: bool,
    pub causal_reasoning: bool,
    pub comparative_reasoning: bool,
    pub procedural_reasoning: bool,
    pub predictive_reasoning: bool,
    pub ethical_reasoning: bool,
    pub creative_reasoning: bool,
    pub logical_reasoning: bool,
    pub handles_long_generation: bool,
    pub efficient_short_responses: bool,
}

/// Read-only configuration for one inference backend model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Which backend serves this model.
    pub backend: LlmBackendType,
    /// Model identifier or filesystem path; also the metrics key.
    pub model_path: String,
    /// Generation token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Nucleus sampling mass.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Top-k sampling cutoff.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Quantization tag ("GGUF", "AWQ") when the weights are quantized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    /// Tensor-parallel worker count for multi-GPU backends.
    #[serde(default = "default_tensor_parallel")]
    pub tensor_parallel_size: u32,
    /// Capability flags used for scoring.
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    /// Relative resource efficiency in [0, 1].
    #[serde(default = "default_resource_efficiency")]
    pub resource_efficiency: f64,
    /// Opaque backend parameters. Passed through untouched; the core never
    /// branches on their contents.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_params: HashMap<String, Value>,
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_top_k() -> u32 {
    50
}

fn default_tensor_parallel() -> u32 {
    1
}

fn default_resource_efficiency() -> f64 {
    0.5
}

impl LlmConfig {
    /// Creates a config with default generation parameters.
    pub fn new(backend: LlmBackendType, model_path: impl Into<String>) -> Self {
        Self {
            backend,
            model_path: model_path.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            quantization: None,
            tensor_parallel_size: default_tensor_parallel(),
            capabilities: ModelCapabilities::default(),
            resource_efficiency: default_resource_efficiency(),
            extra_params: HashMap::new(),
        }
    }
}

/// Plan produced by a backend for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Step index the ReAct loop starts from.
    #[serde(default)]
    pub first_step: u32,
    /// Workflow specification for multi-agent delegation, in the graph
    /// serialization shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_spec: Option<Value>,
    /// Whether a human validation round is requested.
    #[serde(default = "default_requires_validation")]
    pub requires_human_validation: bool,
}

fn default_requires_validation() -> bool {
    true
}

impl Default for Plan {
    fn default() -> Self {
        Self { first_step: 0, workflow_spec: None, requires_human_validation: true }
    }
}

/// One step decision from the backend inside a ReAct loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    /// Reasoning text recorded with the step.
    pub thought: String,
    /// Set when the loop should stop without a tool call.
    #[serde(default)]
    pub done: bool,
    /// Tool to invoke when `done` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Input for the tool invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    /// Step index the loop advances to after this action.
    #[serde(default)]
    pub next_step: u32,
}

impl AgentAction {
    /// Terminal action carrying only a thought.
    pub fn done(thought: impl Into<String>) -> Self {
        Self { thought: thought.into(), done: true, tool: None, tool_input: None, next_step: 0 }
    }

    /// Tool-invoking action.
    pub fn tool_call(
        thought: impl Into<String>,
        tool: impl Into<String>,
        tool_input: Value,
        next_step: u32,
    ) -> Self {
        Self {
            thought: thought.into(),
            done: false,
            tool: Some(tool.into()),
            tool_input: Some(tool_input),
            next_step,
        }
    }
}

/// Self-reported performance numbers from a backend after execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendMetrics {
    /// Prompt tokens consumed, when the backend counts them.
    pub tokens_in: Option<u64>,
    /// Completion tokens produced, when the backend counts them.
    pub tokens_out: Option<u64>,
    /// Backend's own token-efficiency estimate.
    pub token_efficiency: Option<f64>,
    /// Backend's own accuracy estimate.
    pub accuracy: Option<f64>,
    /// Anything else the backend reports; merged into result metrics as-is.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}
