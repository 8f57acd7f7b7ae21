// crates/caseflow-server/src/error.rs
// ============================================================================
// Module: API Error
// Description: Maps internal failures onto the HTTP status taxonomy every
//              inbound handler returns.
// Purpose: Give webhook, cron, and admin handlers one error type that knows
//          how to render itself as a response, instead of each handler
//          hand-rolling status codes.
// Dependencies: axum, caseflow-core, serde_json
// ============================================================================

//! ## Overview
//! `spec.md` §4.1 fixes three outcomes for inbound requests: authentication
//! failure maps to `401`, a payload the dispatcher cannot route maps to
//! `400`, and a task queue that rejects publication maps to `503` without
//! recording the request as seen (so the sender's retry is not treated as a
//! duplicate). [`ApiError`] carries that taxonomy; everything else collapses
//! to `404`/`409`/`500` as appropriate.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use caseflow_core::CoreError;
use serde_json::json;

use crate::correlation::CorrelationIdRejection;

/// An error a handler can return that renders itself as an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The caller's signature, bearer token, or webhook secret did not
    /// verify. Maps to `401`.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// The request body could not be parsed into a payload this dispatcher
    /// understands. Maps to `400`.
    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),
    /// The task queue rejected publication. Maps to `503`; callers must not
    /// record the dedup key for a request that failed this way.
    #[error("task queue unavailable: {0}")]
    QueueUnavailable(String),
    /// The referenced entity does not exist. Maps to `404`.
    #[error("not found: {entity} {id}")]
    NotFound {
        /// Entity kind, e.g. `"case"` or `"escalation"`.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },
    /// The request conflicts with the current state of the entity it
    /// targets. Maps to `409`.
    #[error("conflict: {0}")]
    Conflict(String),
    /// An unexpected internal failure. Maps to `500`. Detail is logged but
    /// not echoed to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code included in the JSON body, matching the
    /// taxonomy named in `spec.md` §4.1.
    const fn code(&self) -> &'static str {
        match self {
            Self::AuthFailed(_) => "AUTH_FAILED",
            Self::UnsupportedPayload(_) => "UNSUPPORTED_PAYLOAD",
            Self::QueueUnavailable(_) => "QUEUE_UNAVAILABLE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            Self::UnsupportedPayload(_) => StatusCode::BAD_REQUEST,
            Self::QueueUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, code = self.code(), "request rejected");
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<CorrelationIdRejection> for ApiError {
    fn from(rejection: CorrelationIdRejection) -> Self {
        Self::UnsupportedPayload(format!("correlation id: {rejection}"))
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Unauthorized(reason) => Self::AuthFailed(reason.to_string()),
            CoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            CoreError::Conflict { entity, detail } => Self::Conflict(format!("{entity}: {detail}")),
            CoreError::Transient { operation, detail } => {
                Self::QueueUnavailable(format!("{operation}: {detail}"))
            }
            CoreError::Timeout { operation, elapsed_ms } => {
                Self::Internal(format!("{operation} timed out after {elapsed_ms}ms"))
            }
            CoreError::InvalidResponse { source, detail } => {
                Self::UnsupportedPayload(format!("{source}: {detail}"))
            }
        }
    }
}
