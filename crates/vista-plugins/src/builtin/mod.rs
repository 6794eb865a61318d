//! Plugins shipped with the server.
//!
//! - [`frame`]: frame inspection (`decode`, `checksum`, `timestamp`, `strip_image`)
//! - [`debug`]: pipeline diagnostics (`echo`, `trace`, `fail`), opt-in

pub mod debug;
pub mod frame;

use std::sync::Arc;

use crate::registry::InMemoryRegistry;

/// Build a registry holding the built-in plugins.
pub fn default_registry(enable_debug: bool) -> InMemoryRegistry {
    let mut registry = InMemoryRegistry::new();
    registry.register(Arc::new(frame::plugin()));
    if enable_debug {
        registry.register(Arc::new(debug::plugin()));
    }
    registry
}
