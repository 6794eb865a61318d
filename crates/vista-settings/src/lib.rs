//! # vista-settings
//!
//! Layered configuration for the Vista analysis backend.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`VistaSettings::default()`]
//! 2. **Settings file**: `~/.vista/settings.json` (missing file is fine)
//! 3. **Environment variables**: `VISTA_*`, with `__` separating sections
//!    (`VISTA_SERVER__PORT=9000`, `VISTA_PIPELINE__FRAME_TIMEOUT_MS=500`)
//!
//! # Usage
//!
//! ```no_run
//! let settings = vista_settings::load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{ENV_PREFIX, load_settings, load_settings_from_path, settings_path};
pub use types::*;
