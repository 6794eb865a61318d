//! Settings type definitions.
//!
//! Every section is `#[serde(default)]`, so a settings file only needs the
//! keys it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VistaSettings {
    /// HTTP / WebSocket listener.
    pub server: ServerSettings,
    /// Pipeline run limits per transport.
    pub pipeline: PipelineSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Built-in plugin switches.
    pub plugins: PluginSettings,
}

/// Listener and connection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Interval between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Frames one WebSocket connection may have executing at once.
    pub max_frames_in_flight: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8700,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            heartbeat_interval_secs: 30,
            max_frames_in_flight: 4,
        }
    }
}

/// Per-transport run limits. A timeout of `0` disables it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Deadline for one `POST /pipeline` run.
    pub rest_timeout_ms: u64,
    /// Deadline for one WebSocket frame.
    pub frame_timeout_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            rest_timeout_ms: 30_000,
            frame_timeout_ms: 2_000,
        }
    }
}

impl PipelineSettings {
    /// REST deadline, if enabled.
    pub fn rest_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.rest_timeout_ms)
    }

    /// Per-frame deadline, if enabled.
    pub fn frame_timeout(&self) -> Option<Duration> {
        non_zero_ms(self.frame_timeout_ms)
    }
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive (`info`, `vista_pipeline=debug`, ...). `RUST_LOG` wins.
    pub level: String,
    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Built-in plugin switches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSettings {
    /// Register the `debug` plugin (`echo`, `trace`, `fail`).
    pub enable_debug: bool,
}
