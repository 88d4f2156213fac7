//! Tool directory and sandboxed execution.

mod builtin;
mod registry;
mod sandbox;

pub use builtin::{CalculatorTool, DateTimeTool};
pub use registry::{SandboxPolicy, ToolRegistry};
pub use sandbox::{CodeSandbox, ExecutionOutput, SandboxedTool};

use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A callable tool available to agents and workflow TOOL nodes.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry name of the tool.
    fn name(&self) -> &str;

    /// Human-readable description, shown to planning backends.
    fn description(&self) -> &str {
        ""
    }

    /// Runs the tool against a JSON input.
    ///
    /// # Errors
    /// Returns `ToolError::Execution` on failure; the registry absorbs this
    /// into a structured payload for the caller.
    async fn run(&self, input: Value) -> Result<Value, ToolError>;
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send>>;

/// Adapter wrapping an async closure as a [`Tool`].
pub struct FnTool {
    name: String,
    description: String,
    func: Box<dyn Fn(Value) -> ToolFuture + Send + Sync>,
}

impl FnTool {
    /// Creates a tool from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(move |input| Box::pin(func(input))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: Value) -> Result<Value, ToolError> {
        (self.func)(input).await
    }
}
