//! Step recorders: observe each executed step without affecting the run.
//!
//! A [`StepRecord`] carries identifying metadata only. Payload values never
//! reach a recorder, so frames and model outputs stay out of the logs.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::Mutex;
use tracing::{info, warn};

/// Metadata about one successfully executed step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// Id of the enclosing run.
    pub run_id: String,
    /// Plugin that owns the tool.
    pub plugin_id: String,
    /// Tool that ran.
    pub tool: String,
    /// Zero-based step index.
    pub step: usize,
    /// Keys of the tool's output, sorted.
    pub output_keys: Vec<String>,
}

/// Sink for per-step records.
///
/// Called on the executing thread after each tool succeeds and before the
/// next one starts.
pub trait StepRecorder: Send + Sync {
    /// Observe one step.
    fn record(&self, record: &StepRecord);
}

/// Emits one `info` event per step.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingRecorder;

impl StepRecorder for TracingRecorder {
    fn record(&self, record: &StepRecord) {
        info!(
            run_id = %record.run_id,
            plugin_id = %record.plugin_id,
            tool_name = %record.tool,
            step = record.step,
            output_keys = %record.output_keys.join(","),
            "pipeline step completed"
        );
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<StepRecord>>,
}

impl MemoryRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<StepRecord> {
        self.records.lock().clone()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StepRecorder for MemoryRecorder {
    fn record(&self, record: &StepRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRecorder;

impl StepRecorder for NoopRecorder {
    fn record(&self, _record: &StepRecord) {}
}

/// Call `recorder`, containing any panic it raises.
pub(crate) fn record_contained(recorder: &dyn StepRecorder, record: &StepRecord) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| recorder.record(record))) {
        warn!(
            run_id = %record.run_id,
            tool_name = %record.tool,
            step = record.step,
            reason = panic_message(panic.as_ref()),
            "step recorder panicked"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
