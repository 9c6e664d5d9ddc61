// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, session and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Sessions are only established for tokens the auth service accepts
//! 3. Logout ends the cached session for good
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use std::sync::atomic::Ordering;
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_jwt, get, post_json, send};

const USER: i64 = 12345;

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = create_test_app();

    let (status, _) = send(&app.app, get("/vacancies", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = create_test_app();

    let (status, _) = send(&app.app, get("/vacancies", Some("invalid.token.here"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_key_is_rejected() {
    let app = create_test_app();
    let token = create_test_jwt(USER, b"some_other_key_that_is_32_bytes!");

    let (status, _) = send(&app.app, get("/settings", Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_token() {
    let app = create_test_app();
    let token = create_test_jwt(USER, &app.state.config.jwt_signing_key);

    let (status, body) = send(&app.app, get("/settings", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], USER);
    assert_eq!(body["query_text"], "Python developer");
}

#[tokio::test]
async fn test_session_init_info_logout() {
    let app = create_test_app();
    let token = create_test_jwt(USER, &app.state.config.jwt_signing_key);

    let (status, body) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], USER);
    assert!(app.state.tokens.has_session(USER));

    let (status, body) = send(&app.app, get("/session/info", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subscription"]["active"], true);
    assert_eq!(body["subscription"]["daysRemaining"], 12);

    let (status, body) = send(
        &app.app,
        post_json("/session/logout", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logged_out"], true);
    assert!(!app.state.tokens.has_session(USER));

    // The JWT itself is still well-formed, but the session is gone.
    let (status, body) = send(
        &app.app,
        post_json("/notifications/test", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_session_init_rejected_token() {
    let app = create_test_app();
    app.auth.invalid.store(true, Ordering::SeqCst);
    let token = create_test_jwt(USER, &app.state.config.jwt_signing_key);

    let (status, body) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": token })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
    assert!(!app.state.tokens.has_session(USER));
}

#[tokio::test]
async fn test_session_init_requires_token() {
    let app = create_test_app();

    let (status, body) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": "  ", "telegram_id": USER })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(app.state.tokens.is_empty());
}

#[tokio::test]
async fn test_session_init_mismatched_user() {
    let app = create_test_app();
    let token = create_test_jwt(USER, &app.state.config.jwt_signing_key);

    let (status, _) = send(
        &app.app,
        post_json(
            "/session/init",
            None,
            json!({ "token": token, "telegram_id": USER + 1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.tokens.is_empty());
}

#[tokio::test]
async fn test_session_init_opaque_token_uses_profile() {
    let app = create_test_app();
    *app.auth.profile_user.lock().unwrap() = Some(555);

    let (status, body) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": "opaque-token" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], 555);
    assert_eq!(app.state.tokens.peek(555).unwrap().token, "opaque-token");
}

#[tokio::test]
async fn test_session_init_opaque_token_without_user() {
    let app = create_test_app();

    let (status, _) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": "opaque-token" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_outage_during_init() {
    let app = create_test_app();
    app.auth.validate_fails.store(true, Ordering::SeqCst);
    let token = create_test_jwt(USER, &app.state.config.jwt_signing_key);

    let (status, body) = send(
        &app.app,
        post_json("/session/init", None, json!({ "token": token })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "auth_unavailable");
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app();

    let response = app
        .app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/vacancies")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let app = create_test_app();

    let (status, body) = send(&app.app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
