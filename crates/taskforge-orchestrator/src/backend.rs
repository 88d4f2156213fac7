//! Scripted in-process backend for tests and offline runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use taskforge_abstraction::{
    ActionRecord, AgentAction, BackendError, BackendMetrics, BackendProvider, LlmBackend,
    LlmConfig, Plan, Task,
};

/// Backend that replays a scripted sequence of actions.
///
/// Actions are consumed in order across calls; once the script runs out the
/// backend keeps answering with a terminal action so bounded loops can
/// finish. Plan generation can be made to fail to exercise fallback paths.
pub struct MockBackend {
    config: LlmConfig,
    plan: Plan,
    plan_failure: Option<String>,
    actions: Mutex<VecDeque<AgentAction>>,
    final_answer: String,
    metrics: BackendMetrics,
}

impl MockBackend {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            plan: Plan::default(),
            plan_failure: None,
            actions: Mutex::new(VecDeque::new()),
            final_answer: String::new(),
            metrics: BackendMetrics::default(),
        }
    }

    /// Replaces the plan returned by `generate_plan`.
    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = plan;
        self
    }

    /// Makes `generate_plan` fail with the given message.
    #[must_use]
    pub fn with_plan_failure(mut self, message: impl Into<String>) -> Self {
        self.plan_failure = Some(message.into());
        self
    }

    /// Sets the scripted action sequence.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<AgentAction>) -> Self {
        self.actions = Mutex::new(actions.into());
        self
    }

    /// Sets the final answer text.
    #[must_use]
    pub fn with_final_answer(mut self, answer: impl Into<String>) -> Self {
        self.final_answer = answer.into();
        self
    }

    /// Sets the self-reported metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: BackendMetrics) -> Self {
        self.metrics = metrics;
        self
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn generate_plan(
        &self,
        _task: &Task,
        _context: &HashMap<String, Value>,
    ) -> Result<Plan, BackendError> {
        match &self.plan_failure {
            Some(message) => Err(BackendError::PlanGeneration(message.clone())),
            None => Ok(self.plan.clone()),
        }
    }

    async fn next_action(
        &self,
        _current_step: u32,
        _actions: &[ActionRecord],
        _thoughts: &[String],
        _context: &HashMap<String, Value>,
    ) -> Result<AgentAction, BackendError> {
        let next = self.actions.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| AgentAction::done("script exhausted")))
    }

    async fn final_answer(
        &self,
        _task: &Task,
        _thoughts: &[String],
        _actions: &[ActionRecord],
        _context: &HashMap<String, Value>,
    ) -> Result<String, BackendError> {
        Ok(self.final_answer.clone())
    }

    fn performance_metrics(&self) -> BackendMetrics {
        self.metrics.clone()
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }
}

/// Provider serving pre-built backends keyed by model path.
#[derive(Default)]
pub struct MockBackendProvider {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
}

impl MockBackendProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend under the given model path.
    #[must_use]
    pub fn with_backend(
        mut self,
        model_path: impl Into<String>,
        backend: Arc<dyn LlmBackend>,
    ) -> Self {
        self.backends.insert(model_path.into(), backend);
        self
    }
}

#[async_trait]
impl BackendProvider for MockBackendProvider {
    async fn backend_for(&self, config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, BackendError> {
        self.backends
            .get(&config.model_path)
            .cloned()
            .ok_or_else(|| BackendError::Unavailable(config.model_path.clone()))
    }
}
