//! `POST /pipeline`.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::{Span, warn};
use vista_core::{PipelineRequest, PipelineResult};
use vista_pipeline::ExecutionOptions;

use crate::error::ApiError;
use crate::server::AppState;

/// Run one pipeline and return `{result, steps}`.
///
/// The run executes on the blocking pool. If the client goes away before it
/// finishes, the run is cancelled before its next step.
pub async fn run_pipeline(
    State(state): State<AppState>,
    body: Result<Json<PipelineRequest>, JsonRejection>,
) -> Result<Json<PipelineResult>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected pipeline body");
        ApiError::from(rejection)
    })?;

    let cancel = state.shutdown.child_token();
    let guard = cancel.clone().drop_guard();
    let options = ExecutionOptions::new()
        .with_cancel(cancel)
        .with_timeout(state.config.rest_timeout);

    let engine = state.engine.clone();
    let span = Span::current();
    let outcome =
        tokio::task::spawn_blocking(move || span.in_scope(|| engine.run(request, &options))).await;
    let _ = guard.disarm();

    match outcome {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => Err(e.into()),
        Err(join) => Err(ApiError::internal(format!("pipeline worker failed: {join}"))),
    }
}
