//! HTTP mapping for mirror errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use convergence_core::Error;

/// A mirror error on its way out as an HTTP response.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct AppError(#[from] pub Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::EmptyResponse(_) | Error::Parse(_) | Error::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "request rejected");
        }

        (status, status.canonical_reason().unwrap_or("error")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (Error::MethodNotAllowed("x".into()), StatusCode::METHOD_NOT_ALLOWED),
            (Error::EmptyResponse("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Parse("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Transport("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError(error).status(), expected);
        }
    }

    #[test]
    fn test_response_hides_cause() {
        let response = AppError(Error::Transport("secret upstream detail".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
