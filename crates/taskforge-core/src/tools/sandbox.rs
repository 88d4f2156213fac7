//! Process sandbox for untrusted code execution.

use super::Tool;
use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one sandboxed execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Whether the process ran to completion with exit code 0.
    pub success: bool,
    /// Process exit code, when the process exited on its own.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Failure description for timeouts and spawn errors.
    pub error: Option<String>,
    /// Unique id for correlating logs of this execution.
    pub execution_id: Uuid,
}

impl ExecutionOutput {
    fn failure(execution_id: Uuid, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: error.clone(),
            error: Some(error),
            execution_id,
        }
    }
}

/// Runs untrusted code in a separate OS process.
///
/// Each run writes the code to a scratch file, spawns an interpreter
/// process with kill-on-drop set, and enforces a wall-clock timeout with a
/// forced kill on expiry. The scratch file is removed on every exit path
/// (success, timeout, or crash) by the tempfile guard.
#[derive(Debug, Clone)]
pub struct CodeSandbox {
    timeout: Duration,
    interpreter: String,
}

impl CodeSandbox {
    /// Creates a sandbox with the given wall-clock timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, interpreter: "python3".to_string() }
    }

    /// Overrides the interpreter binary (used by tests).
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Executes a piece of code and captures its output.
    ///
    /// Only `python` is supported; other languages come back as a failed
    /// [`ExecutionOutput`] rather than an error.
    pub async fn run_code(&self, code: &str, language: &str) -> ExecutionOutput {
        self.run_code_with_stdin(code, language, None).await
    }

    async fn run_code_with_stdin(
        &self,
        code: &str,
        language: &str,
        stdin: Option<String>,
    ) -> ExecutionOutput {
        let execution_id = Uuid::new_v4();

        if !language.eq_ignore_ascii_case("python") {
            return ExecutionOutput::failure(
                execution_id,
                format!("Unsupported language: {language}"),
            );
        }

        info!(execution_id = %execution_id, code_len = code.len(), "Running code in sandbox");

        // The guard owns the scratch file; dropping it on any return path
        // removes the artifact.
        let mut scratch = match tempfile::Builder::new().suffix(".py").tempfile() {
            Ok(file) => file,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "Failed to create scratch file");
                return ExecutionOutput::failure(execution_id, e.to_string());
            }
        };
        if let Err(e) = scratch.write_all(code.as_bytes()).and_then(|()| scratch.flush()) {
            error!(execution_id = %execution_id, error = %e, "Failed to write scratch file");
            return ExecutionOutput::failure(execution_id, e.to_string());
        }

        let mut command = tokio::process::Command::new(&self.interpreter);
        command
            .arg(scratch.path())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "Failed to spawn sandbox process");
                return ExecutionOutput::failure(execution_id, e.to_string());
            }
        };

        if let Some(payload) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                if let Err(e) = pipe.write_all(payload.as_bytes()).await {
                    warn!(execution_id = %execution_id, error = %e, "Failed to write sandbox stdin");
                }
                // Dropping the pipe closes stdin so json.load sees EOF.
            }
        } else {
            drop(child.stdin.take());
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => ExecutionOutput {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                error: None,
                execution_id,
            },
            Ok(Err(e)) => {
                error!(execution_id = %execution_id, error = %e, "Sandbox process failed");
                ExecutionOutput::failure(execution_id, e.to_string())
            }
            Err(_) => {
                // kill_on_drop reaps the child once the future is dropped.
                warn!(
                    execution_id = %execution_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Sandbox execution timed out, killing process"
                );
                ExecutionOutput::failure(
                    execution_id,
                    format!("Execution timed out after {} seconds", self.timeout.as_secs()),
                )
            }
        }
    }

    /// Executes a tool body in the sandbox against a JSON input.
    ///
    /// The body must define an `execute(tool_input)` function; its return
    /// value is serialized over stdout and parsed back here.
    pub async fn run_tool(&self, tool_code: &str, tool_input: &Value) -> Value {
        let wrapper = format!(
            r#"
import json
import sys

# Tool code
{tool_code}

tool_input = json.load(sys.stdin)

try:
    result = execute(tool_input)
    print(json.dumps({{"success": True, "result": result}}))
except Exception as e:
    print(json.dumps({{"success": False, "error": str(e)}}))
"#,
        );

        let payload = tool_input.to_string();
        let output = self.run_code_with_stdin(&wrapper, "python", Some(payload)).await;
        if !output.success {
            return json!({
                "success": false,
                "error": output.error.unwrap_or(output.stderr),
                "execution_id": output.execution_id.to_string(),
            });
        }

        match serde_json::from_str::<Value>(output.stdout.trim()) {
            Ok(value) => value,
            Err(_) => json!({
                "success": false,
                "error": format!("Failed to parse tool output as JSON: {}", output.stdout.trim()),
                "execution_id": output.execution_id.to_string(),
            }),
        }
    }
}

impl Default for CodeSandbox {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// A registry [`Tool`] whose body is untrusted code run in the sandbox.
///
/// The body must define `execute(tool_input)`; whatever it returns (or
/// raises) comes back as structured data, so a misbehaving body can never
/// take down the registry.
pub struct SandboxedTool {
    name: String,
    description: String,
    code: String,
    sandbox: CodeSandbox,
}

impl SandboxedTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        code: impl Into<String>,
        sandbox: CodeSandbox,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            code: code.into(),
            sandbox,
        }
    }
}

#[async_trait]
impl Tool for SandboxedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, input: Value) -> Result<Value, ToolError> {
        Ok(self.sandbox.run_tool(&self.code, &input).await)
    }
}
