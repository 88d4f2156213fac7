//! `taskforge tools` - list the built-in tools.

use std::sync::Arc;
use taskforge_core::{CalculatorTool, DateTimeTool, SandboxPolicy, ToolRegistry};

pub fn builtin_registry() -> anyhow::Result<ToolRegistry> {
    let registry = ToolRegistry::new(SandboxPolicy::default());
    registry.register(Arc::new(CalculatorTool))?;
    registry.register(Arc::new(DateTimeTool))?;
    Ok(registry)
}

pub fn execute() -> anyhow::Result<()> {
    let registry = builtin_registry()?;
    let descriptions = registry.descriptions();
    for name in registry.list() {
        println!("  {name}: {}", descriptions.get(&name).map_or("", String::as_str));
    }
    Ok(())
}
