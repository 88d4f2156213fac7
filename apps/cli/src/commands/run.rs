//! `taskforge run` - execute one task with the scripted offline backend.
//!
//! No inference server is involved: every catalog model is served by a
//! scripted backend, so this command exercises routing, tool execution, and
//! metrics feedback end to end.

use anyhow::Context;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use taskforge_abstraction::{AgentAction, AgentType, LlmBackend, Task, Tracer};
use taskforge_core::{InMemoryMemory, LocalTracer, NoopTracer};
use taskforge_orchestrator::{
    AgentCore, Catalog, FileMetricsStore, MemoryMetricsStore, MetricsStore, MockBackend,
    MockBackendProvider, ModelRouter,
};

pub struct RunOptions {
    pub query: String,
    pub catalog: PathBuf,
    pub agent_type: AgentType,
    pub max_steps: u32,
    pub metrics: Option<PathBuf>,
    pub trace: Option<PathBuf>,
}

/// Script for one offline backend: calculator call when the query looks
/// arithmetic, otherwise a single terminal step.
fn scripted_backend(name: &str, config: taskforge_abstraction::LlmConfig, query: &str) -> MockBackend {
    let looks_arithmetic =
        query.chars().any(|c| c.is_ascii_digit()) && query.chars().any(|c| "+-*/%^".contains(c));
    let actions = if looks_arithmetic {
        vec![
            AgentAction::tool_call(
                "The query contains an arithmetic expression, evaluating it",
                "calculator",
                json!({ "expression": query }),
                1,
            ),
            AgentAction::done("Calculation finished"),
        ]
    } else {
        vec![AgentAction::done("Nothing further to do")]
    };
    MockBackend::new(config)
        .with_actions(actions)
        .with_final_answer(format!("Processed by {name}: {query}"))
}

pub async fn execute(options: RunOptions) -> anyhow::Result<()> {
    let catalog = Catalog::load(&options.catalog)
        .with_context(|| format!("loading catalog {}", options.catalog.display()))?;

    let mut provider = MockBackendProvider::new();
    for entry in &catalog.entries {
        let backend: Arc<dyn LlmBackend> = Arc::new(scripted_backend(
            &entry.name,
            entry.config.clone(),
            &options.query,
        ));
        provider = provider.with_backend(entry.config.model_path.clone(), backend);
    }

    let store: Arc<dyn MetricsStore> = match &options.metrics {
        Some(path) => Arc::new(FileMetricsStore::open(path)),
        None => Arc::new(MemoryMetricsStore::new()),
    };
    let tracer: Arc<dyn Tracer> = match &options.trace {
        Some(path) => Arc::new(
            LocalTracer::open(path)
                .with_context(|| format!("opening trace file {}", path.display()))?,
        ),
        None => Arc::new(NoopTracer),
    };

    let router = Arc::new(ModelRouter::new(catalog, store));
    let core = AgentCore::new(
        router,
        Arc::new(provider),
        Arc::new(InMemoryMemory::new()),
        Arc::new(super::tools::builtin_registry()?),
        tracer,
    );

    let task = Task::new(options.query)
        .with_agent_type(options.agent_type)
        .with_max_steps(options.max_steps);
    let result = core.run(task).await;

    if result.success {
        println!("{}", result.output);
    } else {
        eprintln!("Task failed: {}", result.error.as_deref().unwrap_or("unknown error"));
    }
    for (i, thought) in result.thoughts.iter().enumerate() {
        println!("  thought {}: {thought}", i + 1);
    }
    for action in &result.actions {
        println!("  tool {}: {}", action.tool, action.result);
    }
    if let Some(model) = result.metrics.get("model_path") {
        println!("  model: {model}");
    }

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("task execution failed")
    }
}
