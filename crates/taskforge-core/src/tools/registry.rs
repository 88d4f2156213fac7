//! Allow-listed tool registry with timeout-bounded execution.

use super::Tool;
use crate::error::ToolError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Registration policy for the registry.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// Tool names permitted to register and execute. Empty means any
    /// registered tool is allowed.
    pub allowed_tools: Vec<String>,
    /// When enabled, registration of a tool outside the allow-list is
    /// refused outright instead of merely logged.
    pub sandbox_mode: bool,
    /// Per-call execution timeout.
    pub timeout: Duration,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self { allowed_tools: Vec::new(), sandbox_mode: true, timeout: Duration::from_secs(30) }
    }
}

impl SandboxPolicy {
    /// Creates a policy allowing only the named tools.
    pub fn allow(tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { allowed_tools: tools.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn permits(&self, name: &str) -> bool {
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == name)
    }
}

/// Name → tool directory gating registration and execution.
///
/// Tool calls are dispatched on a spawned task so a blocking tool cannot
/// stall concurrent node or task execution, and every call is bounded by
/// the configured timeout. Failures come back as data, not panics.
pub struct ToolRegistry {
    policy: SandboxPolicy,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Creates a registry with the given policy.
    pub fn new(policy: SandboxPolicy) -> Self {
        Self { policy, tools: RwLock::new(HashMap::new()) }
    }

    /// Registers a tool.
    ///
    /// Under sandbox mode a tool outside the allow-list is refused and the
    /// refusal logged; the tool is never stored.
    ///
    /// # Errors
    /// Returns `ToolError::NotAllowed` when the gate refuses the tool.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if !self.policy.permits(&name) {
            warn!(tool = %name, "Tool is not in the allowed tools list");
            if self.policy.sandbox_mode {
                error!(tool = %name, "Tool registration blocked due to sandbox mode");
                return Err(ToolError::NotAllowed(name));
            }
        }
        self.tools.write().unwrap().insert(name.clone(), tool);
        info!(tool = %name, "Registered tool");
        Ok(())
    }

    /// Removes a tool from the registry.
    pub fn unregister(&self, name: &str) -> bool {
        let removed =
            self.tools.write().unwrap().remove(name).is_some();
        if removed {
            info!(tool = %name, "Unregistered tool");
        }
        removed
    }

    /// Names of all registered tools, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.tools.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    /// Name → description map for all registered tools.
    pub fn descriptions(&self) -> HashMap<String, String> {
        self.tools
            .read()
            .unwrap()
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }

    /// Whether the tool is registered and permitted to execute.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.policy.permits(name)
            && self.tools.read().unwrap().contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        let tools = self.tools.read().unwrap();
        let tool = tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        if !self.policy.permits(name) {
            return Err(ToolError::NotAllowed(name.to_string()));
        }
        Ok(Arc::clone(tool))
    }

    /// Executes a tool, surfacing failures through the error taxonomy.
    ///
    /// The call runs on its own tokio task under the per-call timeout; on
    /// expiry the task is aborted.
    ///
    /// # Errors
    /// `NotFound`, `NotAllowed`, `Timeout`, or `Execution`.
    pub async fn execute_tool_checked(
        &self,
        name: &str,
        input: Value,
    ) -> Result<Value, ToolError> {
        let tool = self.lookup(name)?;
        let timeout_secs = self.policy.timeout.as_secs();
        debug!(tool = %name, "Dispatching tool call");

        let handle = tokio::spawn(async move { tool.run(input).await });
        let abort = handle.abort_handle();
        match tokio::time::timeout(self.policy.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ToolError::Execution {
                name: name.to_string(),
                message: format!("tool task failed: {join_err}"),
            }),
            Err(_) => {
                abort.abort();
                Err(ToolError::Timeout { name: name.to_string(), timeout_secs })
            }
        }
    }

    /// Executes a tool, absorbing every failure into a structured payload.
    ///
    /// This is the entry point for ReAct loops and workflow TOOL nodes:
    /// whatever goes wrong, the caller receives `{"error": "..."}` data and
    /// keeps running.
    pub async fn execute_tool(&self, name: &str, input: Value) -> Value {
        match self.execute_tool_checked(name, input).await {
            Ok(value) => value,
            Err(err) => {
                error!(tool = %name, error = %err, "Tool execution failed");
                json!({ "error": err.to_string() })
            }
        }
    }
}
