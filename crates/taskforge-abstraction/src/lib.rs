//! Shared vocabulary for the taskforge orchestration core.
//!
//! This crate defines the task and result types exchanged between the
//! router, the workflow engine, and the agent executor, together with the
//! traits for the external collaborators (LLM backends, memory, tracing,
//! human feedback). It is the leaf of the workspace dependency graph and
//! carries no runtime of its own.

mod model;
mod task;
mod traits;

pub use model::{
    AgentAction, BackendError, BackendMetrics, LlmBackendType, LlmConfig, ModelCapabilities, Plan,
};
pub use task::{ActionRecord, AgentResult, AgentType, Task};
pub use traits::{Agent, BackendProvider, HumanFeedback, LlmBackend, Memory, Tracer};
