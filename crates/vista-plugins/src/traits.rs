//! Core traits for tools, plugins and plugin lookup.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use vista_core::{Payload, ToolError};

// ─────────────────────────────────────────────────────────────────────────────
// Tool
// ─────────────────────────────────────────────────────────────────────────────

/// A single named operation that maps an input payload to an output.
///
/// Tools return a raw [`Value`] so the engine can detect (and reject) a
/// tool that breaks the contract by returning something other than an object.
pub trait Tool: Send + Sync {
    /// Name the tool is addressed by inside its plugin.
    fn name(&self) -> &str;

    /// One-line description for tool catalogs.
    fn description(&self) -> &str {
        ""
    }

    /// Run the tool. Owns its input; anything it wants downstream tools to
    /// see must be present in the returned object.
    fn invoke(&self, payload: Payload) -> Result<Value, ToolError>;
}

/// Catalog entry for a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

/// A component exposing a named set of tools.
pub trait Plugin: Send + Sync {
    /// Registry identifier.
    fn id(&self) -> &str;

    /// Every tool this plugin exposes, sorted by name.
    fn tools(&self) -> Vec<ToolInfo>;

    /// Whether `name` is one of this plugin's tools.
    fn has_tool(&self, name: &str) -> bool;

    /// Invoke a tool by name.
    fn run(&self, tool: &str, payload: Payload) -> Result<Value, ToolError>;
}

/// Catalog entry for a plugin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    /// Plugin identifier.
    pub id: String,
    /// The plugin's tools.
    pub tools: Vec<ToolInfo>,
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only plugin lookup shared by all concurrent runs.
pub trait PluginRegistry: Send + Sync {
    /// Resolve a plugin by id.
    fn lookup(&self, id: &str) -> Option<Arc<dyn Plugin>>;

    /// Every registered plugin id, sorted.
    fn plugin_ids(&self) -> Vec<String>;

    /// Full catalog of plugins and their tools.
    fn catalog(&self) -> Vec<PluginInfo> {
        self.plugin_ids()
            .into_iter()
            .filter_map(|id| self.lookup(&id))
            .map(|plugin| PluginInfo {
                id: plugin.id().to_owned(),
                tools: plugin.tools(),
            })
            .collect()
    }
}
