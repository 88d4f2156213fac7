//! Tool registry, sandbox, and workflow graph engine for taskforge.
//!
//! This crate holds the side-effecting half of the orchestration core: the
//! allow-listed tool directory with timeout-bounded execution, the process
//! sandbox for untrusted code, and the DAG workflow engine that dispatches
//! agent and tool nodes in concurrent waves.

pub mod error;
pub mod memory;
pub mod tools;
pub mod trace;
pub mod workflow;

pub use error::{ToolError, WorkflowError};
pub use memory::InMemoryMemory;
pub use tools::{
    CalculatorTool, CodeSandbox, DateTimeTool, ExecutionOutput, FnTool, SandboxPolicy,
    SandboxedTool, Tool, ToolRegistry,
};
pub use trace::{LocalTracer, NoopTracer};
pub use workflow::{
    EdgeCondition, NodeConfig, NodeFailurePolicy, NodeType, WorkflowBuilder, WorkflowEdge,
    WorkflowExecutor, WorkflowGraph, WorkflowNode, WorkflowOutcome, WorkflowState,
};
