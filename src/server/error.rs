use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::TrackerError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl TrackerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            TrackerError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            TrackerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            TrackerError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        }
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        // Storage details stay in the log.
        let message = if self.is_client_error() {
            warn!("Rejected request: {self}");
            self.to_string()
        } else {
            error!("Request failed on storage {self:?}");
            "storage failure".to_string()
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for TrackerError {
    fn from(rejection: JsonRejection) -> Self {
        TrackerError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for TrackerError {
    fn from(rejection: QueryRejection) -> Self {
        TrackerError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for TrackerError {
    fn from(rejection: PathRejection) -> Self {
        TrackerError::validation(rejection.body_text())
    }
}
