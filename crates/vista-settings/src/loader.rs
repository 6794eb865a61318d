//! Settings loading through `figment`.
//!
//! Loading flow:
//! 1. Start with compiled [`VistaSettings::default()`]
//! 2. Merge the JSON settings file if it exists (objects merge per key)
//! 3. Merge `VISTA_*` environment variables (highest priority)
//! 4. Check value ranges

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::VistaSettings;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "VISTA_";

/// Resolve the default settings file (`~/.vista/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".vista").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<VistaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file with env var overrides.
///
/// A missing file yields defaults plus environment. Malformed JSON or a
/// value of the wrong type is an error.
pub fn load_settings_from_path(path: &Path) -> Result<VistaSettings> {
    if path.exists() {
        debug!(?path, "loading settings from file");
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let settings: VistaSettings = Figment::from(Serialized::defaults(VistaSettings::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    check_ranges(&settings)?;
    Ok(settings)
}

fn check_ranges(settings: &VistaSettings) -> Result<()> {
    if settings.server.max_frames_in_flight == 0 {
        return Err(SettingsError::InvalidValue(
            "server.max_frames_in_flight must be at least 1".into(),
        ));
    }
    if settings.server.max_message_size < 1024 {
        return Err(SettingsError::InvalidValue(
            "server.max_message_size must be at least 1024 bytes".into(),
        ));
    }
    if settings.server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeat_interval_secs must be at least 1".into(),
        ));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
