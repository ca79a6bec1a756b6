use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to the client. Provider details stay in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("An edit for this design is already in progress")]
    EditInProgress,

    #[error("System busy, please try again")]
    Busy,

    #[error("Edit failed")]
    EditFailed,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::EditInProgress => (StatusCode::CONFLICT, "EDIT_IN_PROGRESS"),
            AppError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "SYSTEM_BUSY"),
            AppError::EditFailed => (StatusCode::BAD_GATEWAY, "EDIT_FAILED"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string()
            }
        }));
        (status, body).into_response()
    }
}
