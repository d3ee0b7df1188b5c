use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Time slot not found: {0}")]
    NotFound(String),
    #[error("This slot is already booked")]
    AlreadyBooked,
    #[error("This slot is not booked")]
    NotBooked,
    #[error("{0}")]
    Forbidden(String),
    #[error("You must be logged in")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already exists")]
    EmailTaken,
    #[error("Email not found")]
    EmailNotFound,
    #[error("Incorrect security answer")]
    IncorrectSecurityAnswer,
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Snapshot file error: {0}")]
    Snapshot(#[from] std::io::Error),
    #[error("Snapshot file is malformed: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::NotFound(_) | BookingError::EmailNotFound => StatusCode::NOT_FOUND,
            BookingError::AlreadyBooked
            | BookingError::NotBooked
            | BookingError::IncorrectSecurityAnswer
            | BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::Unauthenticated | BookingError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            BookingError::EmailTaken => StatusCode::CONFLICT,
            BookingError::Snapshot(_) | BookingError::SnapshotFormat(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ValidationErrors> for BookingError {
    fn from(errors: ValidationErrors) -> Self {
        BookingError::Validation(errors.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(err = %self, "Request failed");
            "Internal error".to_string()
        } else {
            warn!(err = %self, "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
