//! `frame` plugin: inspection tools for a single video frame.
//!
//! Frames arrive as `image_data`, either raw base64 or a `data:` URL. Every
//! tool re-emits the keys it received, so `frame_id` and friends survive the
//! whole chain.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use vista_core::{Payload, ToolError};

use crate::plugin::{FnTool, ToolPlugin};

/// Registry id of the frame plugin.
pub const PLUGIN_ID: &str = "frame";

/// Key holding the encoded frame.
pub const IMAGE_DATA: &str = "image_data";

/// Build the frame plugin.
pub fn plugin() -> ToolPlugin {
    ToolPlugin::new(PLUGIN_ID)
        .with_tool(
            FnTool::new("decode", decode)
                .with_description("Decode image_data and report byte_len, mime, width and height"),
        )
        .with_tool(
            FnTool::new("checksum", checksum)
                .with_description("SHA-256 of the decoded image bytes"),
        )
        .with_tool(
            FnTool::new("timestamp", timestamp)
                .with_description("Stamp processed_at with the current UTC time"),
        )
        .with_tool(
            FnTool::new("strip_image", strip_image)
                .with_description("Drop image_data to keep results small"),
        )
}

fn decode(mut payload: Payload) -> Result<Value, ToolError> {
    let frame = decode_image_data(&payload)?;
    let mime = frame
        .declared_mime
        .or_else(|| sniff_mime(&frame.bytes).map(str::to_owned));

    let _ = payload.insert("byte_len".into(), json!(frame.bytes.len()));
    let _ = payload.insert("mime".into(), mime.map_or(Value::Null, Value::String));
    if let Some((width, height)) = png_dimensions(&frame.bytes) {
        let _ = payload.insert("width".into(), json!(width));
        let _ = payload.insert("height".into(), json!(height));
    }
    Ok(Value::Object(payload))
}

fn checksum(mut payload: Payload) -> Result<Value, ToolError> {
    let frame = decode_image_data(&payload)?;
    let hex = format!("{:x}", Sha256::digest(&frame.bytes));
    let _ = payload.insert("sha256".into(), Value::String(hex));
    Ok(Value::Object(payload))
}

#[allow(clippy::unnecessary_wraps)]
fn timestamp(mut payload: Payload) -> Result<Value, ToolError> {
    let now = chrono::Utc::now().to_rfc3339();
    let _ = payload.insert("processed_at".into(), Value::String(now));
    Ok(Value::Object(payload))
}

#[allow(clippy::unnecessary_wraps)]
fn strip_image(mut payload: Payload) -> Result<Value, ToolError> {
    let _ = payload.remove(IMAGE_DATA);
    Ok(Value::Object(payload))
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding helpers
// ─────────────────────────────────────────────────────────────────────────────

struct DecodedFrame {
    bytes: Vec<u8>,
    declared_mime: Option<String>,
}

fn decode_image_data(payload: &Payload) -> Result<DecodedFrame, ToolError> {
    let raw = payload
        .get(IMAGE_DATA)
        .ok_or_else(|| ToolError::invalid_input("image_data is required"))?
        .as_str()
        .ok_or_else(|| ToolError::invalid_input("image_data must be a string"))?;

    let (declared_mime, encoded) = split_data_url(raw);
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ToolError::invalid_input(format!("image_data is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(ToolError::invalid_input("image_data is empty"));
    }
    Ok(DecodedFrame {
        bytes,
        declared_mime,
    })
}

/// Split `data:<mime>;base64,<data>` into its mime and data parts.
fn split_data_url(raw: &str) -> (Option<String>, &str) {
    let Some(rest) = raw.strip_prefix("data:") else {
        return (None, raw);
    };
    match rest.split_once(";base64,") {
        Some((mime, data)) if !mime.is_empty() => (Some(mime.to_owned()), data),
        Some((_, data)) => (None, data),
        None => (None, raw),
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// Width and height from a PNG IHDR chunk.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if sniff_mime(bytes) != Some("image/png") || bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}
