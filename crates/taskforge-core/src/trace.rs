//! Execution tracers.
//!
//! Tracing hooks are fire-and-forget: a tracer that cannot record an event
//! logs a warning and moves on. Task execution never fails because of
//! observability.

use chrono::Utc;
use serde_json::{json, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use taskforge_abstraction::{LlmConfig, Plan, Task, Tracer};
use tracing::warn;

/// Tracer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_trace(&self, _task: &Task) {}
    fn log_model_selection(&self, _config: &LlmConfig, _reason: &str) {}
    fn log_plan(&self, _plan: &Plan) {}
    fn log_tool_start(&self, _name: &str, _input: &Value) {}
    fn log_tool_end(&self, _name: &str, _output: &Value) {}
    fn log_error(&self, _error: &str) {}
    fn end_trace(&self) {}
}

/// Tracer that appends one JSON line per event to a local file.
pub struct LocalTracer {
    file: Mutex<File>,
}

impl LocalTracer {
    /// Opens (or creates) the trace file in append mode.
    ///
    /// # Errors
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    fn emit(&self, event: &str, fields: Value) {
        let line = json!({
            "ts": Utc::now().to_rfc3339(),
            "event": event,
            "fields": fields,
        });
        let mut file = self.file.lock().unwrap();
        if let Err(e) = writeln!(file, "{line}") {
            warn!(event = %event, error = %e, "Failed to write trace event");
        }
    }
}

impl Tracer for LocalTracer {
    fn start_trace(&self, task: &Task) {
        self.emit(
            "start_trace",
            json!({
                "task_id": task.id.to_string(),
                "query": task.query,
                "agent_type": task.agent_type.to_string(),
            }),
        );
    }

    fn log_model_selection(&self, config: &LlmConfig, reason: &str) {
        self.emit(
            "model_selection",
            json!({ "model": config.model_path, "reason": reason }),
        );
    }

    fn log_plan(&self, plan: &Plan) {
        self.emit(
            "plan",
            json!({
                "first_step": plan.first_step,
                "requires_human_validation": plan.requires_human_validation,
            }),
        );
    }

    fn log_tool_start(&self, name: &str, input: &Value) {
        self.emit("tool_start", json!({ "tool": name, "input": input }));
    }

    fn log_tool_end(&self, name: &str, output: &Value) {
        self.emit("tool_end", json!({ "tool": name, "output": output }));
    }

    fn log_error(&self, error: &str) {
        self.emit("error", json!({ "error": error }));
    }

    fn end_trace(&self) {
        self.emit("end_trace", json!({}));
    }
}
