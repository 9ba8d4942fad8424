//! # Error
//!
//! The ingest handler's error surface. Every error response carries the
//! request's correlation id alongside a short machine-readable message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("request body is not valid JSON")]
    MalformedJson,
    #[error("missing or incorrect shared secret")]
    Unauthorized,
    #[error("the lead store is currently unavailable")]
    StoreUnavailable(#[source] lead_gateway_common::store::StoreError),
    #[error("the job queue is currently unavailable")]
    QueueUnavailable(#[source] lead_gateway_common::queue::DatabaseError),
}

impl IngestError {
    fn status(&self) -> StatusCode {
        match self {
            IngestError::MalformedJson => StatusCode::BAD_REQUEST,
            IngestError::Unauthorized => StatusCode::UNAUTHORIZED,
            IngestError::StoreUnavailable(_) | IngestError::QueueUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

/// Render an `IngestError` into the response the handler returns, given the
/// correlation id generated at the top of the request.
pub fn ingest_error_response(error: &IngestError, correlation_id: &str) -> Response {
    tracing::warn!(correlation_id, error = %error, "ingest request failed");

    (
        error.status(),
        Json(ErrorBody {
            error: error.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
        .into_response()
}

/// Renders a 500 with a correlation id. Used by the panic-catching layer so
/// an unexpected fault never takes the whole server down silently.
pub fn internal_error_response(correlation_id: &str) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error", correlation_id)
}

/// Renders a 405 with a correlation id. Used by the method-not-allowed
/// fallback so a wrong-method request gets the same `ErrorBody` shape as
/// every other error response instead of axum's default empty body.
pub fn method_not_allowed_response(correlation_id: &str) -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed", correlation_id)
}

fn error_response(status: StatusCode, message: &str, correlation_id: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
            correlation_id: correlation_id.to_string(),
        }),
    )
        .into_response()
}
