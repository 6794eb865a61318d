//! Pipeline request and result types.
//!
//! These are the wire shapes of the `POST /pipeline` contract. A
//! [`PipelineRequest`] deserializes leniently: a missing `plugin_id` or
//! `tools` becomes empty so the validator can reject it with a proper
//! `InvalidPipeline` error instead of a serde failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A string-keyed mapping of arbitrary JSON values passed between tools.
pub type Payload = Map<String, Value>;

/// A request to run an ordered chain of tools from one plugin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Plugin that owns every tool in the chain.
    #[serde(default)]
    pub plugin_id: String,
    /// Tool names in execution order. Duplicates are allowed.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Input handed verbatim to the first tool.
    #[serde(default)]
    pub payload: Payload,
}

impl PipelineRequest {
    /// Build a request from its parts.
    pub fn new(
        plugin_id: impl Into<String>,
        tools: impl IntoIterator<Item = impl Into<String>>,
        payload: Payload,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            tools: tools.into_iter().map(Into::into).collect(),
            payload,
        }
    }
}

/// The record of one successfully executed tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Name of the tool that produced `output`.
    pub tool: String,
    /// The tool's full output mapping.
    pub output: Payload,
}

/// Outcome of a completed pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Output of the last step.
    pub result: Payload,
    /// One entry per executed tool, in execution order.
    pub steps: Vec<PipelineStep>,
}

/// Short name of a JSON value's type, used in contract-violation messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
