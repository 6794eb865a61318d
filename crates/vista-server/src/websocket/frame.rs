//! WebSocket frame protocol.
//!
//! Inbound:
//! ```json
//! {"type": "frame", "frame_id": "f-1", "image_data": "...", "plugin_id": "frame", "tools": ["decode"]}
//! ```
//! Every field other than `type`, `plugin_id` and `tools` ends up in the
//! pipeline payload. Outbound is either a [`ResultFrame`] or an [`ErrorFrame`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use vista_core::{Payload, PipelineError, PipelineRequest};

/// The only inbound `type` accepted.
pub const FRAME_TYPE: &str = "frame";

/// A parsed inbound frame, ready to run.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameJob {
    /// Correlation id echoed in the reply.
    pub frame_id: String,
    /// The pipeline to run for this frame.
    pub request: PipelineRequest,
}

#[derive(Deserialize)]
struct InboundFrame {
    frame_id: String,
    #[serde(default)]
    plugin_id: String,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(flatten)]
    rest: Payload,
}

/// Successful reply: the final payload only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultFrame {
    /// Id of the frame this answers.
    pub frame_id: String,
    /// Output of the last tool.
    pub result: Payload,
}

/// Failure reply. The connection stays open after sending one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    /// What went wrong.
    pub message: String,
    /// Id of the offending frame, empty when it could not be read.
    pub frame_id: String,
    /// Machine-readable code for pipeline failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl ErrorFrame {
    /// A protocol-level error.
    pub fn new(frame_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
            frame_id: frame_id.into(),
            code: None,
        }
    }

    /// The error frame for a failed run.
    pub fn from_pipeline(frame_id: impl Into<String>, err: &PipelineError) -> Self {
        Self {
            code: Some(err.code()),
            ..Self::new(frame_id, err.to_string())
        }
    }
}

/// Serialize an outbound frame to text.
pub fn to_text<T: Serialize>(frame: &T) -> String {
    serde_json::to_string(frame).unwrap_or_else(|e| {
        error!(error = %e, "failed to serialize outbound frame");
        String::new()
    })
}

/// Parse one inbound text message.
///
/// The error side is the reply to send back; it carries the frame id
/// whenever the message got far enough to have one.
pub fn parse_frame(text: &str) -> Result<FrameJob, ErrorFrame> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ErrorFrame::new("", format!("invalid JSON: {e}")))?;
    let Value::Object(mut object) = value else {
        return Err(ErrorFrame::new("", "frame must be a JSON object"));
    };

    let frame_id = object
        .get("frame_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    match object.remove("type") {
        Some(Value::String(kind)) if kind == FRAME_TYPE => {}
        Some(Value::String(kind)) => {
            return Err(ErrorFrame::new(frame_id, format!("unknown message type: {kind}")));
        }
        _ => return Err(ErrorFrame::new(frame_id, "missing message type")),
    }

    let inbound: InboundFrame = serde_json::from_value(Value::Object(object))
        .map_err(|e| ErrorFrame::new(frame_id.clone(), format!("invalid frame: {e}")))?;
    if inbound.frame_id.is_empty() {
        return Err(ErrorFrame::new("", "frame_id must not be empty"));
    }
    if inbound.tools.is_empty() {
        return Err(ErrorFrame::new(
            inbound.frame_id,
            "tools must be a non-empty list of tool names",
        ));
    }

    let mut payload = inbound.rest;
    let _ = payload.insert("frame_id".into(), Value::String(inbound.frame_id.clone()));
    Ok(FrameJob {
        frame_id: inbound.frame_id,
        request: PipelineRequest {
            plugin_id: inbound.plugin_id,
            tools: inbound.tools,
            payload,
        },
    })
}
