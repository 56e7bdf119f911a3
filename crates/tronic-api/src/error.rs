use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use tronic_ai::AiError;

/// The full error taxonomy exposed by the REST surface. Validation and auth
/// failures surface immediately with no retry; storage failures on write
/// paths are 500s; generation failures are only fatal on the dedicated AI
/// endpoints (the relay and the activity logger swallow theirs).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("access token required")]
    Unauthenticated,

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid or expired token")]
    SessionNotFound,

    #[error("session expired")]
    SessionExpired,

    #[error("command not allowed: only safe read-only commands are permitted")]
    CommandNotAllowed,

    #[error("AI generation failed: {0}")]
    Generation(#[from] AiError),

    #[error("internal storage error")]
    Storage(#[source] anyhow::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("not found")]
    NotFound,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Storage(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::CommandNotAllowed => StatusCode::BAD_REQUEST,
            Self::Unauthenticated
            | Self::InvalidToken
            | Self::SessionNotFound
            | Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Generation(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Storage(inner) = &self {
            error!("Storage error: {:#}", inner);
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_taxonomy() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::CommandNotAllowed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SessionExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Generation(AiError::Timeout).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }
}
