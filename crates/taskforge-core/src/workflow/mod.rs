//! DAG workflow engine: graph structure, validation, and wave execution.

mod builder;
mod executor;
mod graph;
mod state;

pub use builder::WorkflowBuilder;
pub use executor::{NodeFailurePolicy, WorkflowExecutor, WorkflowOutcome};
pub use graph::{
    AgentNodeConfig, ContextPredicate, EdgeCondition, EdgePredicate, InputMapping, MapFn,
    NodeConfig, NodeType, OutputMapping, ReduceFn, ToolNodeConfig, WorkflowEdge, WorkflowGraph,
    WorkflowNode,
};
pub use state::WorkflowState;
