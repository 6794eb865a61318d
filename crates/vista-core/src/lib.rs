//! # vista-core
//!
//! Shared vocabulary for the Vista analysis backend.
//!
//! - **Payloads**: [`Payload`], the string-keyed JSON mapping passed between tools
//! - **Pipeline types**: [`PipelineRequest`], [`PipelineStep`], [`PipelineResult`]
//! - **Errors**: [`ToolError`], [`ValidationError`], [`PipelineError`] via `thiserror`
//! - **Logging**: subscriber setup and an in-memory capture layer for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod pipeline;

pub use errors::{CancelReason, PipelineError, ToolError, ValidationError};
pub use pipeline::{Payload, PipelineRequest, PipelineResult, PipelineStep, value_kind};
