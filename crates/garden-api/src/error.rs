use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use garden_types::api::ErrorResponse;

/// Every failure a handler can report. The response body is always
/// `{"message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthenticated,

    /// Covers both a wrong password and a wrong username; callers must not be
    /// able to tell which one it was.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Upload too large")]
    PayloadTooLarge,

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthenticated | ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ApiError::Storage(e) => {
                error!("Storage error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Validation(e.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(response_status(ApiError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(response_status(ApiError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(response_status(ApiError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(response_status(ApiError::NotFound("Letter not found")), StatusCode::NOT_FOUND);
        assert_eq!(
            response_status(ApiError::Storage(anyhow::anyhow!("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
