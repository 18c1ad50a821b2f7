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

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Set index {index} out of range (exercise has {set_count} sets)")]
    InvalidSetIndex { index: usize, set_count: usize },

    /// Expected payload version is stale. Callers must re-fetch the exercise
    /// and resubmit with a fresh command identifier.
    #[error("Version conflict: current payload version is {current_version}")]
    VersionConflict { current_version: u32 },

    /// Stored payload is newer than this reader understands. Never coerced.
    #[error("Unsupported payload schema version {found} (latest known is {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },

    #[error("Generator error: {0}")]
    Generator(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Current payload version, present on version conflicts so the caller
    /// can re-fetch and retry with a fresh expected version.
    #[serde(skip_serializing_if = "Option::is_none")]
    current_version: Option<u32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut current_version = None;

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::InvalidSetIndex { .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_set_index",
                Some(self.to_string()),
            ),
            AppError::VersionConflict {
                current_version: current,
            } => {
                current_version = Some(*current);
                (
                    StatusCode::CONFLICT,
                    "version_conflict",
                    Some(self.to_string()),
                )
            }
            AppError::UnsupportedSchemaVersion { .. } => {
                tracing::error!(error = %self, "Unsupported payload schema version");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "unsupported_schema_version",
                    None,
                )
            }
            AppError::Generator(msg) => {
                tracing::error!(error = %msg, "Generator error");
                (StatusCode::BAD_GATEWAY, "generator_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            current_version,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
