//! API error taxonomy.
//!
//! Every error surfaces to the client as `{ "message": ... }` with a status
//! code matching its category. Provider failures on the call-creation path
//! are handled in place (the attempt is still recorded); `Upstream` is for
//! the cases where nothing could be salvaged.

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Not authorized")]
    Unauthorized,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid payload")]
    InvalidWebhookPayload,

    #[error("Provider error: {0}")]
    Upstream(#[from] super::retell::RetellError),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] super::queue::QueueError),
}

// A malformed path parameter is a client mistake like any other; it gets the
// same `{ "message": ... }` body instead of axum's plain-text rejection.
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::Validation("Invalid lead id".to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidWebhookPayload => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) | ApiError::Persistence(_) | ApiError::Queue(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Internal failure detail stays in the logs.
    fn message(&self) -> String {
        match self {
            ApiError::Upstream(_) => "Provider error".to_string(),
            ApiError::Persistence(_) => "Database error".to_string(),
            ApiError::Queue(_) => "Error scheduling call".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { message: self.message() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_category() {
        assert_eq!(
            ApiError::Validation("Phone number is required".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::InsufficientCredits.status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ApiError::NotFound("Lead not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidWebhookPayload.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Persistence(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let err = ApiError::Persistence(sqlx::Error::PoolClosed);
        assert_eq!(err.message(), "Database error");

        let err = ApiError::Validation("Delay must be at least 1 minute".into());
        assert_eq!(err.message(), "Delay must be at least 1 minute");
    }
}
