//! `debug` plugin: tools for exercising pipelines end to end.

use serde_json::Value;
use vista_core::{Payload, ToolError};

use crate::plugin::{FnTool, ToolPlugin};

/// Registry id of the debug plugin.
pub const PLUGIN_ID: &str = "debug";

/// Build the debug plugin.
pub fn plugin() -> ToolPlugin {
    ToolPlugin::new(PLUGIN_ID)
        .with_tool(
            FnTool::new("echo", |payload| Ok(Value::Object(payload)))
                .with_description("Return the payload unchanged"),
        )
        .with_tool(
            FnTool::new("trace", |payload| append_trace(payload, "trace"))
                .with_description("Append the tool name to the `trace` array"),
        )
        .with_tool(
            FnTool::new("fail", |_| Err(ToolError::failed("debug.fail always fails")))
                .with_description("Always fail"),
        )
}

/// Push `name` onto `payload["trace"]`, creating the array if needed.
pub fn append_trace(mut payload: Payload, name: &str) -> Result<Value, ToolError> {
    let trace = payload
        .entry("trace")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(items) = trace else {
        return Err(ToolError::invalid_input("trace must be an array"));
    };
    items.push(Value::String(name.to_owned()));
    Ok(Value::Object(payload))
}
