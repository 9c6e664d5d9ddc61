// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Token issue, validation or refresh failed (or timed out).
    #[error("Auth service unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Vacancy search failed: {0}")]
    UpstreamSearch(String),

    #[error("Messaging failed: {0}")]
    Messaging(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::AuthUnavailable(msg) => {
                tracing::warn!(error = %msg, "Auth service unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "auth_unavailable", None)
            }
            AppError::UpstreamSearch(msg) => {
                (StatusCode::BAD_GATEWAY, "search_error", Some(msg.clone()))
            }
            AppError::Messaging(msg) => {
                (StatusCode::BAD_GATEWAY, "messaging_error", Some(msg.clone()))
            }
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Persistence error");
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
