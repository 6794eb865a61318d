//! Capability-map plugin: tool name → [`Tool`] implementation.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use vista_core::{Payload, ToolError};

use crate::traits::{Plugin, Tool, ToolInfo};

/// A plugin backed by an explicit dispatch table of tools.
pub struct ToolPlugin {
    id: String,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolPlugin {
    /// Create a plugin with no tools.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tools: HashMap::new(),
        }
    }

    /// Add a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(plugin_id = %self.id, tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }
}

impl Plugin for ToolPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn tools(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_owned(),
                description: t.description().to_owned(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    fn run(&self, tool: &str, payload: Payload) -> Result<Value, ToolError> {
        let Some(handler) = self.tools.get(tool) else {
            return Err(ToolError::UnknownTool(tool.to_owned()));
        };
        handler.invoke(payload)
    }
}

type ToolFn = dyn Fn(Payload) -> Result<Value, ToolError> + Send + Sync;

/// A tool defined by a closure.
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    /// Wrap a closure as a tool.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Payload) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            func: Box::new(func),
        }
    }

    /// Set the catalog description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&self, payload: Payload) -> Result<Value, ToolError> {
        (self.func)(payload)
    }
}
