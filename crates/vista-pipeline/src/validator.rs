//! Pre-execution checks. A request that fails here never reaches a tool.

use std::sync::Arc;

use vista_core::ValidationError;
use vista_plugins::{Plugin, PluginRegistry};

/// Resolve `plugin_id` and check that every tool in `tools` belongs to it.
///
/// Returns the resolved plugin. Reports the first unknown tool with its
/// position in the list.
pub fn validate(
    registry: &dyn PluginRegistry,
    plugin_id: &str,
    tools: &[String],
) -> Result<Arc<dyn Plugin>, ValidationError> {
    if plugin_id.is_empty() {
        return Err(ValidationError::EmptyPluginId);
    }
    let plugin = registry
        .lookup(plugin_id)
        .ok_or_else(|| ValidationError::UnknownPlugin(plugin_id.to_owned()))?;
    if tools.is_empty() {
        return Err(ValidationError::EmptyToolList);
    }
    if let Some((index, tool)) = tools.iter().enumerate().find(|(_, t)| !plugin.has_tool(t)) {
        return Err(ValidationError::UnknownTool {
            plugin_id: plugin_id.to_owned(),
            tool: tool.clone(),
            index,
        });
    }
    Ok(plugin)
}
