//! Application error type mapping to HTTP status codes.
//!
//! The error body is always `{"error": "<message>"}`. Note the intended
//! asymmetry: these errors are for ordinary chat operations only -- the
//! chatbot query endpoint absorbs its failures and never produces one.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use huddle_types::error::ChatError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Bad input shape or length.
    Validation(String),
    /// Missing or malformed credentials.
    Unauthorized(String),
    /// Authenticated but not a member of the group.
    Forbidden,
    /// The addressed entity does not exist.
    NotFound(&'static str),
    /// Store failure surfaced by a chat operation.
    Chat(ChatError),
    /// Anything else.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, what.to_string()),
            AppError::Chat(err) => match err {
                ChatError::InvalidBody { .. }
                | ChatError::InvalidKind(_)
                | ChatError::InvalidLimit { .. }
                | ChatError::InvalidOffset => (StatusCode::BAD_REQUEST, err.to_string()),
                ChatError::SendFailed | ChatError::FetchFailed => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
                }
            },
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
