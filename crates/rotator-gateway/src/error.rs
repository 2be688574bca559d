use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rotator_core::ShortenerError;
use rotator_redirector::RedirectorError;
use thiserror::Error;
use tracing::error;

use crate::model::ErrorResponse;
use crate::validation::ValidationError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedBody(rejection.body_text())
    }
}

impl From<ShortenerError> for AppError {
    fn from(err: ShortenerError) -> Self {
        match err {
            ShortenerError::InvalidInput(message) => AppError::InvalidInput(message),
            ShortenerError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl From<RedirectorError> for AppError {
    fn from(err: RedirectorError) -> Self {
        match err {
            RedirectorError::NotFound(code) => AppError::NotFound(code),
            RedirectorError::Internal(message) => AppError::Internal(message),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedBody(_) | AppError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(detail) => {
                error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorResponse {
                error: true,
                message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let not_found = AppError::from(RedirectorError::NotFound("abc".to_string()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let internal = AppError::from(RedirectorError::Internal("db down".to_string()));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let invalid = AppError::from(ShortenerError::InvalidInput("empty".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let validation = AppError::from(ValidationError::NoUrls);
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
    }
}
