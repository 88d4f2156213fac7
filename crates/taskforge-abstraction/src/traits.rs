//! Collaborator traits at the orchestration core's boundary.

use crate::model::{AgentAction, BackendError, BackendMetrics, LlmConfig, Plan};
use crate::task::{ActionRecord, AgentResult, Task};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// An inference backend serving one model.
///
/// All implementations must be `Send + Sync`; calls are I/O-bound awaits
/// delegated to an external process or service.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generates an execution plan for the task.
    ///
    /// # Errors
    /// Returns `BackendError` if the backend cannot produce a plan.
    async fn generate_plan(
        &self,
        task: &Task,
        context: &HashMap<String, Value>,
    ) -> Result<Plan, BackendError>;

    /// Requests the next action in a ReAct loop.
    ///
    /// # Arguments
    /// * `current_step` - Step index the loop is at
    /// * `actions` - Tool invocations made so far
    /// * `thoughts` - Reasoning steps recorded so far
    /// * `context` - Shared task context
    ///
    /// # Errors
    /// Returns `BackendError` if generation fails.
    async fn next_action(
        &self,
        current_step: u32,
        actions: &[ActionRecord],
        thoughts: &[String],
        context: &HashMap<String, Value>,
    ) -> Result<AgentAction, BackendError>;

    /// Synthesizes the final answer from the full thought/action history.
    ///
    /// # Errors
    /// Returns `BackendError` if generation fails.
    async fn final_answer(
        &self,
        task: &Task,
        thoughts: &[String],
        actions: &[ActionRecord],
        context: &HashMap<String, Value>,
    ) -> Result<String, BackendError>;

    /// Self-reported performance metrics for the last execution.
    fn performance_metrics(&self) -> BackendMetrics;

    /// The configuration this backend was built from.
    fn config(&self) -> &LlmConfig;
}

/// Instantiates backends from catalog configurations.
#[async_trait]
pub trait BackendProvider: Send + Sync {
    /// Builds (or reuses) a backend for the given configuration.
    ///
    /// # Errors
    /// Returns `BackendError::Unavailable` if no backend can serve it.
    async fn backend_for(&self, config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, BackendError>;
}

/// Key-value memory collaborator.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Retrieves the value stored under `key`, if any.
    async fn retrieve(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn store(&self, key: &str, value: Value);
}

/// Execution tracer collaborator.
///
/// Every hook is fire-and-forget: implementations must swallow their own
/// failures, and callers never inspect a return value.
pub trait Tracer: Send + Sync {
    fn start_trace(&self, task: &Task);
    fn log_model_selection(&self, config: &LlmConfig, reason: &str);
    fn log_plan(&self, plan: &Plan);
    fn log_tool_start(&self, name: &str, input: &Value);
    fn log_tool_end(&self, name: &str, output: &Value);
    fn log_error(&self, error: &str);
    fn end_trace(&self);
}

/// An agent the workflow engine can dispatch AGENT nodes to.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Executes the task to completion and returns its result.
    async fn execute(&self, task: Task) -> AgentResult;
}

/// Human-feedback collaborator for human-in-the-loop tasks.
#[async_trait]
pub trait HumanFeedback: Send + Sync {
    /// Collects feedback on an initial result. The returned value is merged
    /// into the task context before the revision pass.
    async fn review(&self, task: &Task, initial: &AgentResult) -> Value;
}
