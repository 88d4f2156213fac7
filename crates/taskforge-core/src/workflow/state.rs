//! Per-execution workflow state.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Mutable state of one workflow execution.
///
/// Owned exclusively by the executor driving the run. Node handlers only
/// read it; their outputs are merged back between waves, never written
/// concurrently.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub workflow_id: Uuid,
    /// Frontier of node ids eligible to run in the next wave.
    pub current_nodes: HashSet<String>,
    pub completed_nodes: HashSet<String>,
    /// Node id -> stored result.
    pub results: HashMap<String, Value>,
    /// Shared context visible to every node.
    pub context: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Creates the state for a fresh execution positioned at the start node.
    pub fn new(start_node: String, context: HashMap<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            workflow_id: Uuid::new_v4(),
            current_nodes: HashSet::from([start_node]),
            completed_nodes: HashSet::new(),
            results: HashMap::new(),
            context,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
