//! Custom error types for the identity service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for identity endpoints
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// Username already exists
    #[error("Username already exists")]
    Conflict,

    /// Unknown user or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, malformed, or expired token
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Too many requests from the same client within the window
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Internal server error
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
