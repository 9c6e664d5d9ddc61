// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::Value;
use vacancy_tracker::error::AppError;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED, "unauthorized"),
        (AppError::InvalidToken, StatusCode::UNAUTHORIZED, "invalid_token"),
        (
            AppError::NotFound("Listing 1".to_string()),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
        (
            AppError::BadRequest("bad".to_string()),
            StatusCode::BAD_REQUEST,
            "bad_request",
        ),
        (
            AppError::AuthUnavailable("down".to_string()),
            StatusCode::SERVICE_UNAVAILABLE,
            "auth_unavailable",
        ),
        (
            AppError::UpstreamSearch("HTTP 500".to_string()),
            StatusCode::BAD_GATEWAY,
            "search_error",
        ),
        (
            AppError::Messaging("HTTP 502".to_string()),
            StatusCode::BAD_GATEWAY,
            "messaging_error",
        ),
        (
            AppError::Persistence("write failed".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "persistence_error",
        ),
        (
            AppError::Internal(anyhow::anyhow!("boom")),
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
        ),
    ];

    for (err, status, code) in cases {
        let (got_status, body) = render(err).await;
        assert_eq!(got_status, status, "status for {}", code);
        assert_eq!(body["error"], code);
    }
}

#[tokio::test]
async fn test_internal_details_are_not_exposed() {
    let (_, body) = render(AppError::Persistence("credentials for project x".to_string())).await;
    assert!(body.get("details").is_none());

    let (_, body) = render(AppError::AuthUnavailable("10.0.0.3 refused".to_string())).await;
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn test_client_errors_carry_details() {
    let (_, body) = render(AppError::BadRequest("lookback_days: range".to_string())).await;
    assert_eq!(body["details"], "lookback_days: range");
}
