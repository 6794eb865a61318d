//! The pipeline engine: validation and execution behind one entry point.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn};
use uuid::Uuid;
use vista_core::{PipelineError, PipelineRequest, PipelineResult};
use vista_plugins::PluginRegistry;

use crate::executor::{ExecutionOptions, StepContext, run_steps};
use crate::recorder::{StepRecorder, TracingRecorder};
use crate::state::{PipelineState, StateMachine};
use crate::validator::validate;

/// Runs pipeline requests against an injected plugin registry.
///
/// Holds only shared read-only state, so one engine serves any number of
/// concurrent runs.
#[derive(Clone)]
pub struct PipelineEngine {
    registry: Arc<dyn PluginRegistry>,
    recorder: Arc<dyn StepRecorder>,
}

impl PipelineEngine {
    /// Create an engine that records steps with [`TracingRecorder`].
    pub fn new(registry: Arc<dyn PluginRegistry>) -> Self {
        Self {
            registry,
            recorder: Arc::new(TracingRecorder),
        }
    }

    /// Replace the step recorder.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn StepRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// The registry requests are resolved against.
    pub fn registry(&self) -> &Arc<dyn PluginRegistry> {
        &self.registry
    }

    /// Validate and execute `request`.
    ///
    /// Blocks the calling thread for the duration of the run.
    pub fn run(
        &self,
        request: PipelineRequest,
        options: &ExecutionOptions,
    ) -> Result<PipelineResult, PipelineError> {
        let run_id = Uuid::now_v7().to_string();
        let span = info_span!(
            "pipeline.run",
            run_id = %run_id,
            plugin_id = %request.plugin_id,
            tools = request.tools.len()
        );
        let _enter = span.enter();
        let started = Instant::now();

        let mut state = StateMachine::new();
        let plugin = match validate(self.registry.as_ref(), &request.plugin_id, &request.tools) {
            Ok(plugin) => plugin,
            Err(e) => {
                state.advance(PipelineState::Rejected);
                info!(error = %e, "pipeline rejected");
                return Err(e.into());
            }
        };

        let ctx = StepContext {
            run_id: &run_id,
            recorder: self.recorder.as_ref(),
        };
        let outcome = run_steps(
            plugin.as_ref(),
            &request.tools,
            request.payload,
            options,
            ctx,
            &mut state,
        );

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            Ok(result) => info!(steps = result.steps.len(), elapsed_ms, "pipeline completed"),
            Err(e) => warn!(code = e.code(), error = %e, elapsed_ms, "pipeline failed"),
        }
        outcome
    }
}
