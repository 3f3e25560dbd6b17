//! Custom error types for the budget service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for budget API endpoints
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// No session, or the session's token failed the trust policy
    #[error("Unauthorized")]
    Unauthorized,

    /// Record absent or owned by another user
    #[error("{0}")]
    NotFound(String),

    /// Internal server error, no detail leaked
    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
