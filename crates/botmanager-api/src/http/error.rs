//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Client-side bot errors (conflict, not found, invalid input) all answer
//! 400; the envelope `code` tells them apart.
//!
//! An error does not know which request it belongs to. Its parts ride on the
//! response extensions and the request-id layer renders the final envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use botmanager_types::error::BotError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Bot-related errors.
    Bot(BotError),
    /// Missing or unknown API key.
    Unauthorized(String),
    /// Valid API key without the route's scope.
    Forbidden(String),
    /// Request body or query could not be decoded.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<BotError> for AppError {
    fn from(e: BotError) -> Self {
        AppError::Bot(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Bot(BotError::NotFound) => {
                (StatusCode::BAD_REQUEST, "BOT_NOT_FOUND", "Bot not found".to_string())
            }
            AppError::Bot(BotError::Conflict(msg)) => {
                (StatusCode::BAD_REQUEST, "BOT_CONFLICT", msg.clone())
            }
            AppError::Bot(BotError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Bot(e @ BotError::Unauthenticated(_)) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
            }
            AppError::Bot(e @ (BotError::Unavailable(_) | BotError::Cancelled)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", e.to_string())
            }
            AppError::Bot(e @ BotError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "BOT_ERROR", e.to_string())
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

/// An error's envelope fields, left on the response for the request-id layer.
#[derive(Debug, Clone)]
pub struct ErrorParts {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ErrorParts {
    /// Render the error envelope for `request_id`.
    pub fn render(&self, request_id: String) -> Response {
        ApiResponse::error(self.status, self.code, &self.message, request_id).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let parts = ErrorParts {
            status,
            code,
            message,
        };
        let mut response = parts.render(String::new());
        response.extensions_mut().insert(parts);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_code(e: AppError) -> (StatusCode, &'static str) {
        let (status, code, _) = e.parts();
        (status, code)
    }

    #[test]
    fn client_errors_are_bad_request_with_distinct_codes() {
        assert_eq!(
            status_and_code(BotError::NotFound.into()),
            (StatusCode::BAD_REQUEST, "BOT_NOT_FOUND")
        );
        assert_eq!(
            status_and_code(BotError::Conflict("dup".into()).into()),
            (StatusCode::BAD_REQUEST, "BOT_CONFLICT")
        );
        assert_eq!(
            status_and_code(BotError::InvalidInput("bad".into()).into()),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
    }

    #[test]
    fn server_side_errors() {
        assert_eq!(
            status_and_code(BotError::Unavailable("down".into()).into()).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_and_code(BotError::Cancelled.into()).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_and_code(BotError::Unauthenticated("none".into()).into()).0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_and_code(BotError::Storage("decode".into()).into()).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
