//! In-process key-value memory.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use taskforge_abstraction::Memory;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local [`Memory`] backed by a `HashMap`.
///
/// Suitable for single-process deployments and tests; nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    entries: RwLock<HashMap<String, Value>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Memory for InMemoryMemory {
    async fn retrieve(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn store(&self, key: &str, value: Value) {
        debug!(key = %key, "Storing memory entry");
        self.entries.write().await.insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let memory = InMemoryMemory::new();
        assert!(memory.retrieve("missing").await.is_none());

        memory.store("result", json!({"answer": 42})).await;
        assert_eq!(memory.retrieve("result").await, Some(json!({"answer": 42})));
        assert_eq!(memory.len().await, 1);
    }

    #[tokio::test]
    async fn test_store_replaces() {
        let memory = InMemoryMemory::new();
        memory.store("k", json!(1)).await;
        memory.store("k", json!(2)).await;
        assert_eq!(memory.retrieve("k").await, Some(json!(2)));
        assert_eq!(memory.len().await, 1);
    }
}
