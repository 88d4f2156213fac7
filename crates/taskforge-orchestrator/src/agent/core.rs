//! Agent execution core: one task's lifecycle from context retrieval to
//! metrics feedback.

use super::phase::TaskPhase;
use crate::routing::{classify_task, MetricsObservation, ModelRouter, RoutingError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use taskforge_abstraction::{
    ActionRecord, Agent, AgentResult, AgentType, BackendError, BackendMetrics, BackendProvider,
    HumanFeedback, LlmBackend, Memory, Plan, Task, Tracer,
};
use taskforge_core::workflow::{WorkflowExecutor, WorkflowGraph, WorkflowOutcome};
use taskforge_core::{ToolRegistry, WorkflowError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures inside one task execution. Never escapes [`AgentCore::execute`];
/// converted into a failed [`AgentResult`] instead.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Primary model and every fallback failed to produce a plan.
    #[error("Plan generation failed: {0}")]
    PlanGenerationFailed(#[source] BackendError),

    #[error("Plan has no workflow specification")]
    MissingWorkflowSpec,

    #[error("No workflow engine configured for multi-agent tasks")]
    NoWorkflowEngine,

    #[error("Backend returned a tool action without a tool name")]
    ActionWithoutTool,
}

/// Orchestrates a single task: memory lookup, model selection, plan
/// generation with fallback, bounded execution, and metrics feedback.
///
/// Every execution feeds the router's metrics store, including failures:
/// whatever model was active when the task died gets the failure recorded
/// against it.
pub struct AgentCore {
    router: Arc<ModelRouter>,
    provider: Arc<dyn BackendProvider>,
    memory: Arc<dyn Memory>,
    tools: Arc<ToolRegistry>,
    tracer: Arc<dyn Tracer>,
    workflow: Option<Arc<WorkflowExecutor>>,
    human_feedback: Option<Arc<dyn HumanFeedback>>,
}

impl AgentCore {
    pub fn new(
        router: Arc<ModelRouter>,
        provider: Arc<dyn BackendProvider>,
        memory: Arc<dyn Memory>,
        tools: Arc<ToolRegistry>,
        tracer: Arc<dyn Tracer>,
    ) -> Self {
        Self { router, provider, memory, tools, tracer, workflow: None, human_feedback: None }
    }

    /// Attaches a workflow executor for MULTI_AGENT tasks.
    #[must_use]
    pub fn with_workflow_executor(mut self, executor: Arc<WorkflowExecutor>) -> Self {
        self.workflow = Some(executor);
        self
    }

    /// Attaches a human-feedback collaborator for HUMAN_IN_LOOP tasks.
    #[must_use]
    pub fn with_human_feedback(mut self, feedback: Arc<dyn HumanFeedback>) -> Self {
        self.human_feedback = Some(feedback);
        self
    }

    /// Runs the task to completion.
    ///
    /// Never returns an error: any failure becomes a failed result with
    /// `error` populated, and the active model (if one was selected) has
    /// the failure recorded against it.
    pub async fn run(&self, task: Task) -> AgentResult {
        self.tracer.start_trace(&task);
        let started = Instant::now();
        let mut active_model: Option<String> = None;

        let result = match self.try_execute(&task, started, &mut active_model).await {
            Ok(result) => result,
            Err(error) => self.absorb_error(&task, started, active_model, &error),
        };

        self.tracer.end_trace();
        result
    }

    async fn try_execute(
        &self,
        task: &Task,
        started: Instant,
        active_model: &mut Option<String>,
    ) -> Result<AgentResult, AgentError> {
        debug!(task_id = %task.id, phase = %TaskPhase::ContextRetrieval, "Task phase");
        let mut context = self.retrieve_context(task).await;

        debug!(task_id = %task.id, phase = %TaskPhase::ModelSelection, "Task phase");
        let (config, reason) = self.router.select_model(task, &context)?;
        self.tracer.log_model_selection(&config, &reason);
        *active_model = Some(config.model_path.clone());

        debug!(task_id = %task.id, phase = %TaskPhase::PlanGeneration, "Task phase");
        let mut backend = self.provider.backend_for(&config).await?;
        let plan = match backend.generate_plan(task, &context).await {
            Ok(plan) => {
                self.tracer.log_plan(&plan);
                plan
            }
            Err(plan_error) => {
                warn!(task_id = %task.id, error = %plan_error, "Primary model failed to plan");
                debug!(task_id = %task.id, phase = %TaskPhase::FallbackSearch, "Task phase");
                match self.search_fallback(task, &context).await {
                    Some((fallback_backend, fallback_plan, model_path)) => {
                        backend = fallback_backend;
                        *active_model = Some(model_path);
                        self.tracer.log_plan(&fallback_plan);
                        fallback_plan
                    }
                    // All fallbacks exhausted; the original failure wins.
                    None => return Err(AgentError::PlanGenerationFailed(plan_error)),
                }
            }
        };

        debug!(task_id = %task.id, phase = %TaskPhase::Execution, "Task phase");
        let mut result = match task.agent_type {
            AgentType::React => {
                self.execute_react(task, &plan, &context, backend.as_ref()).await?
            }
            AgentType::MultiAgent => self.execute_multi_agent(task, &plan, &context).await?,
            AgentType::HumanInLoop => {
                self.execute_human_in_loop(task, &plan, &mut context, backend.as_ref()).await?
            }
        };

        if let Ok(value) = serde_json::to_value(&result) {
            self.memory.store(&task.result_key, value).await;
        }

        debug!(task_id = %task.id, phase = %TaskPhase::MetricsRecord, "Task phase");
        self.record_metrics(task, started, active_model.as_deref(), &mut result, backend.as_ref());
        debug!(task_id = %task.id, phase = %TaskPhase::Done, "Task phase");
        Ok(result)
    }

    async fn retrieve_context(&self, task: &Task) -> HashMap<String, Value> {
        match self.memory.retrieve(&task.context_key).await {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(other) => HashMap::from([("context".to_string(), other)]),
            None => HashMap::new(),
        }
    }

    /// Tries the fallback chain in catalog order; the first backend that
    /// produces a plan becomes the active model.
    async fn search_fallback(
        &self,
        task: &Task,
        context: &HashMap<String, Value>,
    ) -> Option<(Arc<dyn LlmBackend>, Plan, String)> {
        for fallback_config in self.router.fallback_configs() {
            info!(model = %fallback_config.model_path, "Trying fallback model");
            let backend = match self.provider.backend_for(&fallback_config).await {
                Ok(backend) => backend,
                Err(e) => {
                    warn!(model = %fallback_config.model_path, error = %e, "Fallback backend unavailable");
                    continue;
                }
            };
            match backend.generate_plan(task, context).await {
                Ok(plan) => {
                    self.tracer.log_model_selection(
                        &fallback_config,
                        "Fallback model selected after primary plan failure",
                    );
                    return Some((backend, plan, fallback_config.model_path));
                }
                Err(e) => {
                    warn!(model = %fallback_config.model_path, error = %e, "Fallback model failed to plan");
                }
            }
        }
        None
    }

    /// Bounded think/act/observe loop.
    ///
    /// Runs at most `task.max_steps` iterations; each iteration asks the
    /// backend for one action, and a `done` action stops the loop without
    /// a tool call. Tool failures come back as data and the loop keeps
    /// going.
    async fn execute_react(
        &self,
        task: &Task,
        plan: &Plan,
        context: &HashMap<String, Value>,
        backend: &dyn LlmBackend,
    ) -> Result<AgentResult, AgentError> {
        let mut thoughts: Vec<String> = Vec::new();
        let mut actions: Vec<ActionRecord> = Vec::new();
        let mut current_step = plan.first_step;

        for _ in 0..task.max_steps {
            let action = backend.next_action(current_step, &actions, &thoughts, context).await?;
            thoughts.push(action.thought.clone());

            if action.done {
                break;
            }

            let tool = action.tool.ok_or(AgentError::ActionWithoutTool)?;
            let tool_input = action.tool_input.unwrap_or(Value::Null);

            self.tracer.log_tool_start(&tool, &tool_input);
            let tool_result = self.tools.execute_tool(&tool, tool_input.clone()).await;
            self.tracer.log_tool_end(&tool, &tool_result);

            actions.push(ActionRecord {
                tool,
                tool_input,
                result: tool_result,
                timestamp: Utc::now(),
            });
            current_step = action.next_step;
        }

        let final_answer = backend.final_answer(task, &thoughts, &actions, context).await?;

        let mut result = AgentResult::success(task.id, final_answer);
        result.thoughts = thoughts;
        result.actions = actions;
        result.metrics = metrics_map(&backend.performance_metrics());
        Ok(result)
    }

    /// Delegates the plan's workflow spec to the graph engine.
    async fn execute_multi_agent(
        &self,
        task: &Task,
        plan: &Plan,
        context: &HashMap<String, Value>,
    ) -> Result<AgentResult, AgentError> {
        let executor = self.workflow.as_ref().ok_or(AgentError::NoWorkflowEngine)?;
        let spec = plan.workflow_spec.as_ref().ok_or(AgentError::MissingWorkflowSpec)?;

        let graph = WorkflowGraph::from_value(spec)?;
        let outcome = executor.execute(&graph, context.clone()).await?;
        Ok(workflow_outcome_to_result(task, &outcome))
    }

    /// One ReAct pass, then an optional human-validated second pass.
    async fn execute_human_in_loop(
        &self,
        task: &Task,
        plan: &Plan,
        context: &mut HashMap<String, Value>,
        backend: &dyn LlmBackend,
    ) -> Result<AgentResult, AgentError> {
        let initial = self.execute_react(task, plan, context, backend).await?;

        if plan.requires_human_validation {
            if let Some(feedback) = &self.human_feedback {
                let review = feedback.review(task, &initial).await;
                context.insert("human_feedback".to_string(), review);
                return self.execute_react(task, plan, context, backend).await;
            }
        }
        Ok(initial)
    }

    fn record_metrics(
        &self,
        task: &Task,
        started: Instant,
        active_model: Option<&str>,
        result: &mut AgentResult,
        backend: &dyn LlmBackend,
    ) {
        let execution_time = started.elapsed().as_secs_f64();
        let backend_metrics = backend.performance_metrics();

        let token_efficiency = match (backend_metrics.tokens_in, backend_metrics.tokens_out) {
            (Some(tokens_in), Some(tokens_out)) if tokens_in > 0 => {
                tokens_out as f64 / tokens_in as f64
            }
            _ => backend_metrics.token_efficiency.unwrap_or(0.5),
        };
        let accuracy = if result.success {
            result
                .metrics
                .get("accuracy")
                .and_then(Value::as_f64)
                .or(backend_metrics.accuracy)
                .unwrap_or(0.8)
        } else {
            0.0
        };

        if let Some(model_path) = active_model {
            self.router.update_model_metrics(
                model_path,
                &MetricsObservation {
                    success_rate: Some(if result.success { 1.0 } else { 0.0 }),
                    avg_latency: Some(execution_time * 1000.0),
                    accuracy: Some(accuracy),
                    token_efficiency: Some(token_efficiency),
                    task_type: Some(classify_task(&task.query, &task.tools_allowed)),
                    success: Some(result.success),
                    extra: HashMap::new(),
                },
            );
            result
                .metrics
                .insert("model_path".to_string(), Value::String(model_path.to_string()));
        }

        if let Some(number) = serde_json::Number::from_f64(execution_time) {
            result.metrics.insert("execution_time".to_string(), Value::Number(number));
        }
        for (key, value) in metrics_map(&backend_metrics) {
            result.metrics.entry(key).or_insert(value);
        }
    }

    /// ERROR absorbing state: record the failure against whatever model
    /// was active and hand back a failed result.
    fn absorb_error(
        &self,
        task: &Task,
        started: Instant,
        active_model: Option<String>,
        error: &AgentError,
    ) -> AgentResult {
        debug!(task_id = %task.id, phase = %TaskPhase::Error, "Task phase");
        let message = error.to_string();
        warn!(task_id = %task.id, error = %message, "Task execution failed");
        self.tracer.log_error(&message);

        let execution_time = started.elapsed().as_secs_f64();
        if let Some(model_path) = &active_model {
            self.router.update_model_metrics(
                model_path,
                &MetricsObservation {
                    success_rate: Some(0.0),
                    avg_latency: Some(execution_time * 1000.0),
                    task_type: Some(classify_task(&task.query, &task.tools_allowed)),
                    success: Some(false),
                    ..Default::default()
                },
            );
        }

        let mut result = AgentResult::failure(task.id, message.clone());
        if let Some(number) = serde_json::Number::from_f64(execution_time) {
            result.metrics.insert("execution_time".to_string(), Value::Number(number));
        }
        result.metrics.insert("error".to_string(), Value::String(message));
        if let Some(model_path) = active_model {
            result.metrics.insert("model_path".to_string(), Value::String(model_path));
        }
        result
    }
}

#[async_trait]
impl Agent for AgentCore {
    async fn execute(&self, task: Task) -> AgentResult {
        self.run(task).await
    }
}

fn metrics_map(metrics: &BackendMetrics) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    if let Some(tokens_in) = metrics.tokens_in {
        map.insert("tokens_in".to_string(), Value::from(tokens_in));
    }
    if let Some(tokens_out) = metrics.tokens_out {
        map.insert("tokens_out".to_string(), Value::from(tokens_out));
    }
    if let Some(efficiency) = metrics.token_efficiency {
        if let Some(number) = serde_json::Number::from_f64(efficiency) {
            map.insert("token_efficiency".to_string(), Value::Number(number));
        }
    }
    if let Some(accuracy) = metrics.accuracy {
        if let Some(number) = serde_json::Number::from_f64(accuracy) {
            map.insert("accuracy".to_string(), Value::Number(number));
        }
    }
    for (key, value) in &metrics.extra {
        map.insert(key.clone(), value.clone());
    }
    map
}

/// Converts a workflow outcome into the agent result shape.
///
/// The run counts as successful when it completed and no node stored an
/// error marker.
fn workflow_outcome_to_result(task: &Task, outcome: &WorkflowOutcome) -> AgentResult {
    let failed_nodes: Vec<&String> = outcome
        .results
        .iter()
        .filter(|(_, value)| value.get("error").is_some())
        .map(|(id, _)| id)
        .collect();
    let success = outcome.completed && failed_nodes.is_empty();

    let output = serde_json::to_string(&outcome.results).unwrap_or_default();
    let mut result = if success {
        AgentResult::success(task.id, output)
    } else {
        let mut sorted: Vec<&str> = failed_nodes.iter().map(|s| s.as_str()).collect();
        sorted.sort_unstable();
        let mut failure =
            AgentResult::failure(task.id, format!("Workflow nodes failed: {}", sorted.join(", ")));
        failure.output = output;
        failure
    };
    result
        .metrics
        .insert("workflow_id".to_string(), Value::String(outcome.workflow_id.to_string()));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockBackendProvider};
    use crate::routing::{Catalog, CatalogEntry, MemoryMetricsStore};
    use serde_json::json;
    use taskforge_abstraction::{AgentAction, LlmBackendType, LlmConfig};
    use taskforge_core::tools::{FnTool, SandboxPolicy};
    use taskforge_core::trace::NoopTracer;
    use taskforge_core::InMemoryMemory;

    fn entry(name: &str) -> CatalogEntry {
        CatalogEntry { name: name.to_string(), config: LlmConfig::new(LlmBackendType::Mock, name) }
    }

    struct Harness {
        core: AgentCore,
        router: Arc<ModelRouter>,
        memory: Arc<InMemoryMemory>,
        tool_calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    fn harness(entries: Vec<CatalogEntry>, provider: MockBackendProvider) -> Harness {
        let router =
            Arc::new(ModelRouter::new(Catalog::new(entries), Arc::new(MemoryMetricsStore::new())));
        let memory = Arc::new(InMemoryMemory::new());
        let tools = Arc::new(ToolRegistry::new(SandboxPolicy::default()));

        let tool_calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = tool_calls.clone();
        tools
            .register(Arc::new(FnTool::new("echo", "Echoes", move |input| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(input)
                }
            })))
            .unwrap();

        let core = AgentCore::new(
            router.clone(),
            Arc::new(provider),
            memory.clone(),
            tools,
            Arc::new(NoopTracer),
        );
        Harness { core, router, memory, tool_calls }
    }

    #[tokio::test]
    async fn test_done_on_first_action() {
        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_actions(vec![AgentAction::done("nothing to do")])
            .with_final_answer("summary complete");
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));
        let h = harness(vec![entry("m")], provider);

        let task = Task::new("Summarize this article").with_max_steps(3);
        let result = h.core.run(task).await;

        assert!(result.success);
        assert_eq!(result.output, "summary complete");
        assert_eq!(result.thoughts.len(), 1);
        assert!(result.actions.is_empty());
        assert_eq!(h.tool_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_max_steps_bounds_tool_calls() {
        // The backend never signals done, so the loop must stop at the
        // step bound.
        let actions: Vec<AgentAction> = (0..10)
            .map(|i| AgentAction::tool_call("keep going", "echo", json!({"step": i}), i + 1))
            .collect();
        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_actions(actions)
            .with_final_answer("ran out of steps");
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));
        let h = harness(vec![entry("m")], provider);

        let task = Task::new("loop forever").with_max_steps(3);
        let result = h.core.run(task).await;

        assert!(result.success);
        assert_eq!(result.actions.len(), 3);
        assert_eq!(h.tool_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recoverable_data() {
        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_actions(vec![
                AgentAction::tool_call("try the missing tool", "missing", json!(null), 1),
                AgentAction::done("observed the failure"),
            ])
            .with_final_answer("handled");
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));
        let h = harness(vec![entry("m")], provider);

        let result = h.core.run(Task::new("do something")).await;
        assert!(result.success);
        assert_eq!(result.actions.len(), 1);
        assert!(result.actions[0].result["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_fallback_model_takes_over_planning() {
        let primary = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "primary"))
            .with_plan_failure("primary is down");
        let fallback = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "spare"))
            .with_actions(vec![AgentAction::done("planned by fallback")])
            .with_final_answer("fallback answer");
        let provider = MockBackendProvider::new()
            .with_backend("primary", Arc::new(primary))
            .with_backend("spare", Arc::new(fallback));

        let mut primary_entry = entry("primary");
        primary_entry.config.capabilities.logical_reasoning = true;
        let mut spare = entry("spare");
        spare.config.resource_efficiency = 0.9;
        let h = harness(vec![primary_entry, spare], provider);

        let result = h.core.run(Task::new("plain request")).await;
        assert!(result.success);
        assert_eq!(result.output, "fallback answer");
        // The failure feedback lands on the fallback model, which was
        // active at completion time.
        assert_eq!(result.metrics["model_path"], json!("spare"));
        assert!(h.router.model_metrics("spare").is_some());
    }

    #[tokio::test]
    async fn test_exhausted_fallbacks_fail_the_task_and_record_metrics() {
        let primary = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "primary"))
            .with_plan_failure("no plan today");
        let provider = MockBackendProvider::new().with_backend("primary", Arc::new(primary));
        // No entry passes the fallback efficiency filter.
        let h = harness(vec![entry("primary")], provider);

        let result = h.core.run(Task::new("anything")).await;
        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("no plan today"));
        assert!(result.metrics.contains_key("execution_time"));

        // The ERROR path still feeds the metrics store.
        let metrics = h.router.model_metrics("primary").unwrap();
        assert!((metrics.success_rate - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_result_stored_in_memory() {
        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_actions(vec![AgentAction::done("ok")])
            .with_final_answer("stored");
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));
        let h = harness(vec![entry("m")], provider);

        let task = Task::new("remember me");
        let result_key = task.result_key.clone();
        let result = h.core.run(task).await;
        assert!(result.success);

        let stored = h.memory.retrieve(&result_key).await.unwrap();
        assert_eq!(stored["output"], json!("stored"));
    }

    #[tokio::test]
    async fn test_human_in_loop_runs_second_pass() {
        struct ApproveAll;
        #[async_trait]
        impl HumanFeedback for ApproveAll {
            async fn review(&self, _task: &Task, _initial: &AgentResult) -> Value {
                json!({"approved": true, "comments": "looks good"})
            }
        }

        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_actions(vec![
                AgentAction::done("first pass"),
                AgentAction::done("second pass"),
            ])
            .with_final_answer("validated answer");
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));

        let router = Arc::new(ModelRouter::new(
            Catalog::new(vec![entry("m")]),
            Arc::new(MemoryMetricsStore::new()),
        ));
        let core = AgentCore::new(
            router,
            Arc::new(provider),
            Arc::new(InMemoryMemory::new()),
            Arc::new(ToolRegistry::new(SandboxPolicy::default())),
            Arc::new(NoopTracer),
        )
        .with_human_feedback(Arc::new(ApproveAll));

        let task = Task::new("draft the email").with_agent_type(AgentType::HumanInLoop);
        let result = core.run(task).await;
        assert!(result.success);
        // Second pass produced the returned result.
        assert_eq!(result.thoughts, vec!["second pass"]);
    }

    #[tokio::test]
    async fn test_multi_agent_without_engine_fails_cleanly() {
        let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "m"))
            .with_plan(Plan {
                first_step: 0,
                workflow_spec: Some(json!({"name": "w", "nodes": {}, "edges": []})),
                requires_human_validation: false,
            });
        let provider = MockBackendProvider::new().with_backend("m", Arc::new(backend));
        let h = harness(vec![entry("m")], provider);

        let task = Task::new("orchestrate").with_agent_type(AgentType::MultiAgent);
        let result = h.core.run(task).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("No workflow engine"));
    }
}
