//! In-memory plugin registry.
//!
//! Populated once at startup, then shared behind an `Arc` as a read-only
//! [`PluginRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::traits::{Plugin, PluginRegistry};

/// Registry mapping plugin ids to plugins.
#[derive(Default)]
pub struct InMemoryRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl InMemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Overwrites any existing plugin with the same id.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin_id = plugin.id(), tools = plugin.tools().len(), "plugin registered");
        let _ = self.plugins.insert(plugin.id().to_owned(), plugin);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(Arc::new(plugin));
        self
    }
}

impl PluginRegistry for InMemoryRegistry {
    fn lookup(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(id).cloned()
    }

    fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.keys().cloned().collect();
        ids.sort();
        ids
    }
}
