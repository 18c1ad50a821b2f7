// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error-to-response mapping tests.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use workout_tracker::error::AppError;

async fn body_json(error: AppError) -> (StatusCode, serde_json::Value) {
    let response = error.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_version_conflict_reports_current_version() {
    let (status, body) = body_json(AppError::VersionConflict { current_version: 4 }).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "version_conflict");
    assert_eq!(body["current_version"], 4);
}

#[tokio::test]
async fn test_invalid_set_index_is_bad_request() {
    let (status, body) = body_json(AppError::InvalidSetIndex {
        index: 3,
        set_count: 2,
    })
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_set_index");
}

#[tokio::test]
async fn test_unsupported_schema_version_does_not_leak_details() {
    let (status, body) = body_json(AppError::UnsupportedSchemaVersion {
        found: 9,
        supported: 2,
    })
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "unsupported_schema_version");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_database_errors_are_opaque() {
    let (status, body) = body_json(AppError::Database("connection refused".to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_generator_failures_map_to_bad_gateway() {
    let (status, body) = body_json(AppError::Generator("timeout".to_string())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "generator_error");
}

#[tokio::test]
async fn test_not_found_and_forbidden() {
    let (status, body) = body_json(AppError::NotFound("Exercise x".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = body_json(AppError::Forbidden("not yours".to_string())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}
