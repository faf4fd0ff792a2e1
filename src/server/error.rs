//! HTTP rendering of errors and assembled responses.

use crate::notify::NotifyError;
use crate::response::{AssembledResponse, ErrorEnvelope};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// An error response that does not come out of the scan pipeline.
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ApiError {
    pub fn new(status: StatusCode, envelope: ErrorEnvelope) -> Self {
        Self { status, envelope }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorEnvelope::new(message))
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorEnvelope::method_not_allowed(),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        if e.is_invalid_request() {
            return ApiError::bad_request(e.to_string());
        }
        error!("Send email error: {e}");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorEnvelope::new(e.to_string()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

impl IntoResponse for AssembledResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}
