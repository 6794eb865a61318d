//! # vista-plugins
//!
//! The plugin side of the pipeline contract.
//!
//! - [`Tool`]: one named payload → payload operation
//! - [`Plugin`]: an enumerable set of tools addressed by name
//! - [`PluginRegistry`]: read-only `id -> Plugin` lookup injected into the engine
//! - [`ToolPlugin`] / [`InMemoryRegistry`]: the concrete capability-map versions
//! - [`builtin`]: the `frame` and `debug` plugins shipped with the server

#![deny(unsafe_code)]

pub mod builtin;
pub mod plugin;
pub mod registry;
pub mod traits;

pub use plugin::{FnTool, ToolPlugin};
pub use registry::InMemoryRegistry;
pub use traits::{Plugin, PluginInfo, PluginRegistry, Tool, ToolInfo};
