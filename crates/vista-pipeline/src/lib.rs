//! # vista-pipeline
//!
//! Runs an ordered chain of tools from one plugin.
//!
//! - [`validate`]: reject a request before any tool runs
//! - [`execute`]: fail-fast sequential execution with cancellation checks
//! - [`StepRecorder`]: per-step metadata sink ([`TracingRecorder`] by default)
//! - [`PipelineEngine`]: validate + execute inside a `pipeline.run` span
//!
//! Execution is synchronous. Async transports call [`PipelineEngine::run`]
//! from `spawn_blocking`.

#![deny(unsafe_code)]

pub mod engine;
pub mod executor;
pub mod recorder;
pub mod state;
pub mod validator;

pub use engine::PipelineEngine;
pub use executor::{ExecutionOptions, StepContext, execute};
pub use recorder::{MemoryRecorder, NoopRecorder, StepRecord, StepRecorder, TracingRecorder};
pub use state::{PipelineState, StateMachine};
pub use validator::validate;
