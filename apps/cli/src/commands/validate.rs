//! `taskforge validate` - structural validation of a workflow file.

use anyhow::Context;
use std::path::Path;
use taskforge_core::WorkflowGraph;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow file {}", path.display()))?;
    let spec: serde_json::Value =
        serde_json::from_str(&contents).context("workflow file is not valid JSON")?;
    let graph = WorkflowGraph::from_value(&spec).context("workflow specification is malformed")?;

    let errors = graph.validate();
    if errors.is_empty() {
        println!(
            "{}: valid ({} nodes, {} edges)",
            graph.name,
            graph.nodes.len(),
            graph.edges.len()
        );
        return Ok(());
    }

    eprintln!("{}: {} validation error(s)", graph.name, errors.len());
    for error in &errors {
        eprintln!("  - {error}");
    }
    anyhow::bail!("workflow failed validation")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskforge_core::WorkflowBuilder;

    #[test]
    fn test_valid_workflow_file_passes() {
        let mut args = serde_json::Map::new();
        args.insert("expression".to_string(), json!("1 + 1"));
        let graph = WorkflowBuilder::new("calc")
            .tool_node("add", "calculator", args)
            .unwrap()
            .connect("start", "add")
            .unwrap()
            .connect("add", "end")
            .unwrap()
            .build();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        std::fs::write(&path, serde_json::to_string(&graph.to_value()).unwrap()).unwrap();
        assert!(execute(&path).is_ok());
    }

    #[test]
    fn test_disconnected_workflow_fails() {
        let graph = WorkflowBuilder::new("broken").build();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        std::fs::write(&path, serde_json::to_string(&graph.to_value()).unwrap()).unwrap();
        assert!(execute(&path).is_err());
    }

    #[test]
    fn test_non_json_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(execute(&path).is_err());
    }
}
