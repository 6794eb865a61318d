//! Server configuration.

use std::time::Duration;

use vista_settings::VistaSettings;

/// Runtime configuration for [`VistaServer`](crate::VistaServer).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Max WebSocket message size and REST body size, in bytes.
    pub max_message_size: usize,
    /// Seconds between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Frames one connection may have executing at once.
    pub max_frames_in_flight: usize,
    /// Deadline for one REST run.
    pub rest_timeout: Option<Duration>,
    /// Deadline for one WebSocket frame, counted from its arrival.
    pub frame_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            heartbeat_interval_secs: 30,
            max_frames_in_flight: 4,
            rest_timeout: Some(Duration::from_secs(30)),
            frame_timeout: Some(Duration::from_secs(2)),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &VistaSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_message_size: settings.server.max_message_size,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            max_frames_in_flight: settings.server.max_frames_in_flight,
            rest_timeout: settings.pipeline.rest_timeout(),
            frame_timeout: settings.pipeline.frame_timeout(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Interval between pings.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence after which a client counts as gone: two missed ping cycles.
    pub fn pong_timeout(&self) -> Duration {
        self.heartbeat_interval() * 2
    }
}
