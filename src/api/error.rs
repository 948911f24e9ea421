// src/api/error.rs
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::types::{ApiResponse, error_codes};
use crate::{ErrorKind, LedgerError, ValidationError};

/// Handler error: a ledger error rendered as a status code plus envelope.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, i32) {
        if let LedgerError::DeadlineExceeded(_) = self.0 {
            return (StatusCode::GATEWAY_TIMEOUT, error_codes::DEADLINE_EXCEEDED);
        }
        match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            ErrorKind::Conflict => (StatusCode::CONFLICT, error_codes::CONFLICT),
            ErrorKind::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
            ),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

fn malformed(body_text: String) -> ApiError {
    ApiError(ValidationError::Malformed(body_text).into())
}

pub fn from_json_rejection(rejection: JsonRejection) -> ApiError {
    malformed(rejection.body_text())
}

pub fn from_query_rejection(rejection: QueryRejection) -> ApiError {
    malformed(rejection.body_text())
}

pub fn from_path_rejection(rejection: PathRejection) -> ApiError {
    malformed(rejection.body_text())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Internal details stay in the log
        let msg = if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
            match self.0 {
                LedgerError::DeadlineExceeded(_) => "Deadline exceeded".to_string(),
                _ => "Internal error".to_string(),
            }
        } else {
            self.0.to_string()
        };

        (status, Json(ApiResponse::<()>::error(code, msg))).into_response()
    }
}
