//! HTTP error responses.
//!
//! Every error body has the shape `{"error": {"code": "...", "message": "..."}}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;
use vista_core::{CancelReason, PipelineError};

/// An error ready to be sent as an HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

impl ApiError {
    /// Build an error.
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    /// 500 for failures outside the pipeline itself.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::InvalidPipeline(_) => StatusCode::BAD_REQUEST,
            PipelineError::ToolExecution { .. } | PipelineError::ToolContractViolation { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Cancelled {
                reason: CancelReason::Deadline,
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            PipelineError::Cancelled {
                reason: CancelReason::Signal,
                ..
            } => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // well-formed JSON of the wrong shape
            JsonRejection::JsonDataError(e) => {
                Self::new(StatusCode::BAD_REQUEST, "INVALID_PIPELINE", e.body_text())
            }
            other => Self::new(other.status(), "INVALID_REQUEST", other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                code = self.code,
                status = self.status.as_u16(),
                message = %self.message,
                "request failed"
            );
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
