//! Error types for tools and workflow execution.

use thiserror::Error;

/// Errors raised by the tool registry.
///
/// Callers inside the orchestration loop convert these into structured
/// result payloads; they never abort a task on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// No tool registered under this name.
    #[error("Tool '{0}' not found")]
    NotFound(String),

    /// The tool is registered but not on the allow-list.
    #[error("Tool '{0}' is not allowed")]
    NotAllowed(String),

    /// The call exceeded its per-call timeout.
    #[error("Tool '{name}' execution timed out after {timeout_secs} seconds")]
    Timeout {
        /// Tool name.
        name: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The tool itself failed (or panicked).
    #[error("Error executing tool '{name}': {message}")]
    Execution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },
}

/// Errors raised by the workflow graph engine.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The graph failed pre-execution validation. Execution never starts.
    #[error("Invalid workflow: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// A second START node was added to the graph.
    #[error("Workflow can only have one start node")]
    DuplicateStart,

    /// An edge references a node id that is not in the graph.
    #[error("Edge references unknown node '{0}'")]
    UnknownNode(String),

    /// A node failed and the executor runs under the fail-fast policy.
    #[error("Node '{node_id}' failed: {message}")]
    NodeFailed {
        /// Node that failed.
        node_id: String,
        /// Failure description.
        message: String,
    },

    /// A serialized workflow specification could not be interpreted.
    #[error("Invalid workflow spec: {0}")]
    InvalidSpec(String),
}
