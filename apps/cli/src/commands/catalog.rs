//! `taskforge catalog` - inspect a model catalog and preview routing.

use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use taskforge_abstraction::Task;
use taskforge_orchestrator::{Catalog, MemoryMetricsStore, ModelRouter};

pub fn execute(path: &Path, query: Option<&str>) -> anyhow::Result<()> {
    let catalog = Catalog::load(path)
        .with_context(|| format!("loading catalog {}", path.display()))?;

    println!("{} model(s):", catalog.len());
    for entry in &catalog.entries {
        let quantized = entry
            .config
            .quantization
            .as_deref()
            .map(|q| format!(", {q}"))
            .unwrap_or_default();
        println!(
            "  {} [{}{}] path={} efficiency={:.2}",
            entry.name,
            entry.config.backend,
            quantized,
            entry.config.model_path,
            entry.config.resource_efficiency
        );
    }

    if let Some(query) = query {
        let router = ModelRouter::new(catalog, Arc::new(MemoryMetricsStore::new()));
        let task = Task::new(query);
        let (config, reason) = router.select_model(&task, &HashMap::new())?;
        println!();
        println!("Routing preview for: {query}");
        println!("  model: {} (temperature {:.2})", config.model_path, config.temperature);
        println!("  {reason}");
    }
    Ok(())
}
