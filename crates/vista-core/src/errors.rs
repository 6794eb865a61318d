//! Error taxonomy for pipeline runs.
//!
//! - [`ToolError`]: raised by a single tool invocation
//! - [`ValidationError`]: the request was rejected before any tool ran
//! - [`PipelineError`]: everything a run can end with besides success
//!
//! A failing tool's [`ToolError`] is carried by value inside
//! [`PipelineError::ToolExecution`]; [`PipelineError::into_tool_error`] hands
//! it back exactly as the tool produced it.

use std::fmt;

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ToolError
// ─────────────────────────────────────────────────────────────────────────────

/// Failure signaled by a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The payload is missing a field or holds a value the tool can't use.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The tool ran and failed.
    #[error("{0}")]
    Failed(String),

    /// The plugin was asked for a tool it does not expose.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Any other error raised inside the tool.
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ToolError {
    /// Shorthand for [`ToolError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for [`ToolError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ValidationError
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons a pipeline is rejected before execution.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `plugin_id` was empty.
    #[error("plugin_id must not be empty")]
    EmptyPluginId,

    /// No plugin is registered under this id.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    /// The tool list was empty or missing.
    #[error("tools must be a non-empty list of tool names")]
    EmptyToolList,

    /// A tool name is not a capability of the plugin.
    #[error("plugin '{plugin_id}' has no tool '{tool}' (position {index})")]
    UnknownTool {
        /// Plugin that was resolved.
        plugin_id: String,
        /// The offending tool name.
        tool: String,
        /// Zero-based position of the tool in the request.
        index: usize,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// PipelineError
// ─────────────────────────────────────────────────────────────────────────────

/// Why a run stopped before invoking its next tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Signal,
    /// The run's deadline passed.
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("cancelled by caller"),
            Self::Deadline => f.write_str("deadline exceeded"),
        }
    }
}

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rejected by validation; no tool was invoked.
    #[error("invalid pipeline: {0}")]
    InvalidPipeline(#[from] ValidationError),

    /// A tool failed; later tools were not invoked.
    #[error("tool '{tool}' failed at step {step}: {source}")]
    ToolExecution {
        /// Plugin the tool belongs to.
        plugin_id: String,
        /// Tool that failed.
        tool: String,
        /// Zero-based step index.
        step: usize,
        /// The tool's own error.
        #[source]
        source: ToolError,
    },

    /// A tool returned something other than a JSON object.
    #[error("tool '{tool}' at step {step} returned {found}, expected an object")]
    ToolContractViolation {
        /// Plugin the tool belongs to.
        plugin_id: String,
        /// Tool that broke the contract.
        tool: String,
        /// Zero-based step index.
        step: usize,
        /// JSON type actually returned.
        found: &'static str,
    },

    /// The run was stopped between steps.
    #[error("pipeline stopped before step {step}: {reason}")]
    Cancelled {
        /// Index of the step that was not started.
        step: usize,
        /// What stopped the run.
        reason: CancelReason,
    },
}

impl PipelineError {
    /// Stable machine-readable code for wire formats.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPipeline(_) => "INVALID_PIPELINE",
            Self::ToolExecution { .. } => "TOOL_FAILED",
            Self::ToolContractViolation { .. } => "TOOL_CONTRACT_VIOLATION",
            Self::Cancelled {
                reason: CancelReason::Deadline,
                ..
            } => "PIPELINE_TIMEOUT",
            Self::Cancelled {
                reason: CancelReason::Signal,
                ..
            } => "PIPELINE_CANCELLED",
        }
    }

    /// Whether the caller sent a bad request (as opposed to a tool or runtime failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidPipeline(_))
    }

    /// Take back the tool's error unchanged, or return `self` for other variants.
    pub fn into_tool_error(self) -> Result<ToolError, Self> {
        match self {
            Self::ToolExecution { source, .. } => Ok(source),
            other => Err(other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn tool_failure() -> PipelineError {
        PipelineError::ToolExecution {
            plugin_id: "p".into(),
            tool: "t2".into(),
            step: 1,
            source: ToolError::failed("model crashed"),
        }
    }

    #[test]
    fn tool_error_display() {
        assert_eq!(
            ToolError::invalid_input("missing image_data").to_string(),
            "invalid input: missing image_data"
        );
        assert_eq!(ToolError::failed("boom").to_string(), "boom");
        assert_eq!(
            ToolError::UnknownTool("ghost".into()).to_string(),
            "unknown tool: ghost"
        );
    }

    #[test]
    fn boxed_source_is_transparent() {
        let io = std::io::Error::other("disk gone");
        let err = ToolError::from(Box::new(io) as Box<dyn std::error::Error + Send + Sync>);
        assert_eq!(err.to_string(), "disk gone");
    }

    #[test]
    fn validation_display_names_the_tool() {
        let err = ValidationError::UnknownTool {
            plugin_id: "p".into(),
            tool: "ghost".into(),
            index: 1,
        };
        assert_eq!(err.to_string(), "plugin 'p' has no tool 'ghost' (position 1)");
    }

    #[test]
    fn validation_converts_into_pipeline_error() {
        let err: PipelineError = ValidationError::EmptyToolList.into();
        assert_matches!(err, PipelineError::InvalidPipeline(ValidationError::EmptyToolList));
        assert!(err.is_client_error());
        assert_eq!(err.code(), "INVALID_PIPELINE");
    }

    #[test]
    fn codes() {
        assert_eq!(tool_failure().code(), "TOOL_FAILED");
        let violation = PipelineError::ToolContractViolation {
            plugin_id: "p".into(),
            tool: "t".into(),
            step: 0,
            found: "array",
        };
        assert_eq!(violation.code(), "TOOL_CONTRACT_VIOLATION");
        assert!(!violation.is_client_error());

        let timeout = PipelineError::Cancelled {
            step: 2,
            reason: CancelReason::Deadline,
        };
        assert_eq!(timeout.code(), "PIPELINE_TIMEOUT");
        let cancelled = PipelineError::Cancelled {
            step: 0,
            reason: CancelReason::Signal,
        };
        assert_eq!(cancelled.code(), "PIPELINE_CANCELLED");
    }

    #[test]
    fn tool_error_comes_back_unchanged() {
        let err = tool_failure();
        assert!(err.to_string().ends_with("model crashed"));
        let original = err.into_tool_error().unwrap();
        assert_matches!(original, ToolError::Failed(msg) if msg == "model crashed");
    }

    #[test]
    fn into_tool_error_keeps_other_variants() {
        let err: PipelineError = ValidationError::EmptyPluginId.into();
        assert_matches!(err.into_tool_error(), Err(PipelineError::InvalidPipeline(_)));
    }

    #[test]
    fn pipeline_error_display() {
        assert_eq!(
            tool_failure().to_string(),
            "tool 't2' failed at step 1: model crashed"
        );
        let cancelled = PipelineError::Cancelled {
            step: 3,
            reason: CancelReason::Deadline,
        };
        assert_eq!(
            cancelled.to_string(),
            "pipeline stopped before step 3: deadline exceeded"
        );
    }
}
