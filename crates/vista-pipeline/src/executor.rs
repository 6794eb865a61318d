//! Sequential, fail-fast execution of a validated tool chain.
//!
//! Each tool receives the previous tool's full output as its input; the
//! first tool receives the caller's payload. Nothing is merged back in.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vista_core::{
    CancelReason, Payload, PipelineError, PipelineResult, PipelineStep, ValidationError, value_kind,
};
use vista_plugins::Plugin;

use crate::recorder::{NoopRecorder, StepRecord, StepRecorder, record_contained};
use crate::state::{PipelineState, StateMachine};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Per-run inputs: cancellation checked before every step, and whether to
/// keep step outputs.
#[derive(Clone, Debug, Default)]
pub struct ExecutionOptions {
    /// Stop the run when this token is cancelled.
    pub cancel: Option<CancellationToken>,
    /// Stop the run once this instant has passed.
    pub deadline: Option<Instant>,
    /// Leave [`PipelineResult::steps`] empty instead of copying every
    /// intermediate payload into it.
    pub discard_steps: bool,
}

impl ExecutionOptions {
    /// No cancellation, no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline `timeout` from now. `None` leaves it unset.
    #[must_use]
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) => self.with_deadline(Instant::now() + t),
            None => self,
        }
    }

    /// Return only the final payload. Steps are still recorded.
    #[must_use]
    pub fn without_steps(mut self) -> Self {
        self.discard_steps = true;
        self
    }

    /// Why the run must stop now, if it must.
    pub fn interruption(&self) -> Option<CancelReason> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(CancelReason::Signal);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::Deadline);
        }
        None
    }
}

/// Per-run context handed to the recorder.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Id of the run, copied into every [`StepRecord`].
    pub run_id: &'a str,
    /// Where step records go.
    pub recorder: &'a dyn StepRecorder,
}

impl Default for StepContext<'_> {
    fn default() -> Self {
        Self {
            run_id: "",
            recorder: &NoopRecorder,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution
// ─────────────────────────────────────────────────────────────────────────────

/// Run `tools` in order against `plugin`, starting from `payload`.
///
/// The tool names must already be validated against `plugin`. Stops at the
/// first failure, the first non-object output, or the first cancellation
/// check that fires; no later tool is invoked in any of those cases.
pub fn execute(
    plugin: &dyn Plugin,
    tools: &[String],
    payload: Payload,
    options: &ExecutionOptions,
    ctx: StepContext<'_>,
) -> Result<PipelineResult, PipelineError> {
    run_steps(plugin, tools, payload, options, ctx, &mut StateMachine::new())
}

pub(crate) fn run_steps(
    plugin: &dyn Plugin,
    tools: &[String],
    payload: Payload,
    options: &ExecutionOptions,
    ctx: StepContext<'_>,
    state: &mut StateMachine,
) -> Result<PipelineResult, PipelineError> {
    if tools.is_empty() {
        state.advance(PipelineState::Rejected);
        return Err(ValidationError::EmptyToolList.into());
    }

    let plugin_id = plugin.id();
    let mut current = payload;
    let mut steps = Vec::with_capacity(if options.discard_steps { 0 } else { tools.len() });

    for (step, tool) in tools.iter().enumerate() {
        state.advance(PipelineState::Executing(step));

        if let Some(reason) = options.interruption() {
            state.advance(PipelineState::Cancelled);
            info!(step, tool_name = %tool, %reason, "pipeline stopped");
            return Err(PipelineError::Cancelled { step, reason });
        }

        let started = Instant::now();
        let output = match plugin.run(tool, current) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                state.advance(PipelineState::Failed);
                return Err(PipelineError::ToolContractViolation {
                    plugin_id: plugin_id.to_owned(),
                    tool: tool.clone(),
                    step,
                    found: value_kind(&other),
                });
            }
            Err(source) => {
                state.advance(PipelineState::Failed);
                return Err(PipelineError::ToolExecution {
                    plugin_id: plugin_id.to_owned(),
                    tool: tool.clone(),
                    step,
                    source,
                });
            }
        };
        debug!(
            step,
            tool_name = %tool,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "tool finished"
        );

        let mut output_keys: Vec<String> = output.keys().cloned().collect();
        output_keys.sort();
        record_contained(
            ctx.recorder,
            &StepRecord {
                run_id: ctx.run_id.to_owned(),
                plugin_id: plugin_id.to_owned(),
                tool: tool.clone(),
                step,
                output_keys,
            },
        );

        if !options.discard_steps {
            steps.push(PipelineStep {
                tool: tool.clone(),
                output: output.clone(),
            });
        }
        current = output;
    }

    state.advance(PipelineState::Completed);
    Ok(PipelineResult {
        result: current,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use vista_core::ToolError;
    use vista_plugins::{FnTool, ToolPlugin};

    use crate::recorder::MemoryRecorder;

    fn plugin() -> ToolPlugin {
        ToolPlugin::new("p")
            .with_tool(FnTool::new("inc", |mut p: Payload| {
                let n = p.get("n").and_then(Value::as_i64).unwrap_or(0);
                let _ = p.insert("n".into(), json!(n + 1));
                Ok(Value::Object(p))
            }))
            .with_tool(FnTool::new("array", |_| Ok(json!([1, 2]))))
            .with_tool(FnTool::new("boom", |_| Err(ToolError::failed("boom"))))
            .with_tool(FnTool::new("fresh", |_| Ok(json!({"only": true}))))
    }

    fn names(tools: &[&str]) -> Vec<String> {
        tools.iter().map(|t| (*t).to_owned()).collect()
    }

    fn run(tools: &[&str], options: &ExecutionOptions) -> Result<PipelineResult, PipelineError> {
        execute(
            &plugin(),
            &names(tools),
            Payload::new(),
            options,
            StepContext::default(),
        )
    }

    #[test]
    fn chains_outputs() {
        let out = run(&["inc", "inc", "inc"], &ExecutionOptions::new()).unwrap();
        assert_eq!(out.result["n"], 3);
        assert_eq!(out.steps.len(), 3);
        assert_eq!(out.steps[0].output["n"], 1);
        assert_eq!(out.steps[2].output, out.result);
    }

    #[test]
    fn no_merging_of_previous_keys() {
        let out = run(&["inc", "fresh"], &ExecutionOptions::new()).unwrap();
        assert_eq!(Value::Object(out.result), json!({"only": true}));
    }

    #[test]
    fn non_object_output_is_contract_violation() {
        let err = run(&["inc", "array", "inc"], &ExecutionOptions::new()).unwrap_err();
        assert_matches!(
            err,
            PipelineError::ToolContractViolation { tool, step: 1, found: "array", .. } if tool == "array"
        );
    }

    #[test]
    fn tool_error_is_carried_unchanged() {
        let err = run(&["inc", "boom"], &ExecutionOptions::new()).unwrap_err();
        assert_matches!(
            err,
            PipelineError::ToolExecution { ref tool, step: 1, source: ToolError::Failed(ref msg), .. }
                if tool == "boom" && msg == "boom"
        );
    }

    #[test]
    fn empty_tool_list_is_rejected() {
        let err = run(&[], &ExecutionOptions::new()).unwrap_err();
        assert_matches!(err, PipelineError::InvalidPipeline(ValidationError::EmptyToolList));
    }

    #[test]
    fn cancelled_token_stops_before_first_step() {
        let token = CancellationToken::new();
        token.cancel();
        let err = run(&["inc"], &ExecutionOptions::new().with_cancel(token)).unwrap_err();
        assert_matches!(
            err,
            PipelineError::Cancelled { step: 0, reason: CancelReason::Signal }
        );
    }

    #[test]
    fn past_deadline_stops_with_deadline_reason() {
        let options = ExecutionOptions::new().with_deadline(Instant::now());
        let err = run(&["inc"], &options).unwrap_err();
        assert_matches!(
            err,
            PipelineError::Cancelled { step: 0, reason: CancelReason::Deadline }
        );
    }

    #[test]
    fn signal_wins_over_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let options = ExecutionOptions::new()
            .with_cancel(token)
            .with_deadline(Instant::now());
        assert_eq!(options.interruption(), Some(CancelReason::Signal));
    }

    #[test]
    fn with_timeout_none_leaves_deadline_unset() {
        let options = ExecutionOptions::new().with_timeout(None);
        assert!(options.deadline.is_none());
        assert_eq!(options.interruption(), None);
        let options = ExecutionOptions::new().with_timeout(Some(Duration::from_secs(60)));
        assert!(options.deadline.is_some());
        assert_eq!(options.interruption(), None);
    }

    #[test]
    fn records_sorted_output_keys_per_step() {
        let recorder = MemoryRecorder::new();
        let mut payload = Payload::new();
        let _ = payload.insert("z".into(), json!(0));
        let _ = execute(
            &plugin(),
            &names(&["inc", "fresh"]),
            payload,
            &ExecutionOptions::new(),
            StepContext {
                run_id: "r1",
                recorder: &recorder,
            },
        )
        .unwrap();

        let records = recorder.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].output_keys, vec!["n", "z"]);
        assert_eq!(records[0].run_id, "r1");
        assert_eq!(records[0].plugin_id, "p");
        assert_eq!(records[1].tool, "fresh");
        assert_eq!(records[1].step, 1);
    }

    #[test]
    fn without_steps_keeps_result_and_records() {
        let recorder = MemoryRecorder::new();
        let out = execute(
            &plugin(),
            &names(&["inc", "inc"]),
            Payload::new(),
            &ExecutionOptions::new().without_steps(),
            StepContext {
                run_id: "r2",
                recorder: &recorder,
            },
        )
        .unwrap();
        assert_eq!(out.result["n"], 2);
        assert!(out.steps.is_empty());
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn state_ends_terminal() {
        let mut sm = StateMachine::new();
        let _ = run_steps(
            &plugin(),
            &names(&["inc", "boom", "inc"]),
            Payload::new(),
            &ExecutionOptions::new(),
            StepContext::default(),
            &mut sm,
        );
        assert_eq!(sm.state(), PipelineState::Failed);
    }
}
