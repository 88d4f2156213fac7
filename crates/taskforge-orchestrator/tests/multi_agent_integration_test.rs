//! End-to-end multi-agent execution: a planned workflow spec runs through
//! the graph engine and comes back as an agent result.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use taskforge_abstraction::{AgentType, LlmBackendType, LlmConfig, Plan, Task};
use taskforge_core::{
    FnTool, InMemoryMemory, NoopTracer, SandboxPolicy, ToolRegistry, WorkflowBuilder,
    WorkflowExecutor,
};
use taskforge_orchestrator::{
    AgentCore, Catalog, CatalogEntry, MemoryMetricsStore, MockBackend, MockBackendProvider,
    ModelRouter,
};

fn catalog_entry(name: &str) -> CatalogEntry {
    CatalogEntry { name: name.to_string(), config: LlmConfig::new(LlmBackendType::Mock, name) }
}

fn registry() -> Arc<ToolRegistry> {
    let tools = Arc::new(ToolRegistry::new(SandboxPolicy::default()));
    tools
        .register(Arc::new(FnTool::new("dataset", "Produces a fixed dataset", |_| async {
            Ok(json!({"rows": 3}))
        })))
        .unwrap();
    tools
}

/// Agent core wired to a real workflow executor sharing the tool registry,
/// with a scripted backend that hands out the given plan.
fn core_with_workflow(plan: Plan, tools: Arc<ToolRegistry>) -> (AgentCore, Arc<ModelRouter>) {
    let backend = MockBackend::new(LlmConfig::new(LlmBackendType::Mock, "planner")).with_plan(plan);
    let provider = MockBackendProvider::new().with_backend("planner", Arc::new(backend));
    let router = Arc::new(ModelRouter::new(
        Catalog::new(vec![catalog_entry("planner")]),
        Arc::new(MemoryMetricsStore::new()),
    ));
    let core = AgentCore::new(
        router.clone(),
        Arc::new(provider),
        Arc::new(InMemoryMemory::new()),
        tools.clone(),
        Arc::new(NoopTracer),
    )
    .with_workflow_executor(Arc::new(WorkflowExecutor::new(tools)));
    (core, router)
}

#[tokio::test]
async fn test_workflow_plan_runs_to_completion() {
    let tools = registry();
    let graph = WorkflowBuilder::new("pipeline")
        .tool_node("fetch", "dataset", Map::new())
        .unwrap()
        .connect("start", "fetch")
        .unwrap()
        .connect("fetch", "end")
        .unwrap()
        .build();
    let plan = Plan { workflow_spec: Some(graph.to_value()), ..Plan::default() };

    let (core, router) = core_with_workflow(plan, tools);
    let task = Task::new("run the pipeline").with_agent_type(AgentType::MultiAgent);
    let result = core.run(task).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.metrics.contains_key("workflow_id"));
    // The serialized node results are the task output.
    let results: Value = serde_json::from_str(&result.output).unwrap();
    assert_eq!(results["fetch"]["rows"], json!(3));
    // Success feedback lands on the planning model.
    let metrics = router.model_metrics("planner").unwrap();
    assert!((metrics.success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_workflow_node_failure_fails_the_task() {
    let tools = registry();
    let graph = WorkflowBuilder::new("broken")
        .tool_node("gone", "unregistered", Map::new())
        .unwrap()
        .connect("start", "gone")
        .unwrap()
        .connect("gone", "end")
        .unwrap()
        .build();
    let plan = Plan { workflow_spec: Some(graph.to_value()), ..Plan::default() };

    let (core, router) = core_with_workflow(plan, tools);
    let result = core.run(Task::new("run it").with_agent_type(AgentType::MultiAgent)).await;

    assert!(!result.success);
    assert!(result.error.as_ref().unwrap().contains("gone"));
    // The run itself drained; the failure is visible as node data.
    let results: Value = serde_json::from_str(&result.output).unwrap();
    assert!(results["gone"]["error"].as_str().unwrap().contains("not found"));
    let metrics = router.model_metrics("planner").unwrap();
    assert!(metrics.success_rate.abs() < f64::EPSILON);
}
