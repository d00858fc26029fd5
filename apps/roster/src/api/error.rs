//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roster_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Anything the roster core reported.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Missing, malformed or expired token.
    #[error("{0}")]
    Unauthorized(String),

    /// Client sent something we refuse outright.
    #[error("{0}")]
    BadRequest(String),

    /// Body or path the extractors could not parse. Keeps axum's status.
    #[error("{1}")]
    Rejected(StatusCode, String),

    /// Too many attempts.
    #[error("Too many requests, slow down")]
    RateLimited,

    /// Task join failures and other plumbing errors.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err {
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                CoreError::Validation(_) | CoreError::InvalidRecord { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CoreError::Conflict(_)
                | CoreError::AlreadyCheckedIn { .. }
                | CoreError::InvalidTransition { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected(status, _) => *status,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!(error = %self, "request failed");
            json!({ "error": self.to_string() })
        } else {
            json!({ "message": self.to_string() })
        };
        (status, Json(body)).into_response()
    }
}
