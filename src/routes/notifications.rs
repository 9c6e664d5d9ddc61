// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Manual notification routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::notifications::{error_message, escape_markdown, test_message, FlushReport};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/test", post(send_test))
        .route("/notifications/custom", post(send_custom))
        .route("/notifications/error", post(send_error))
        .route("/notifications/flush", post(flush))
}

#[derive(Serialize)]
pub struct SentResponse {
    pub sent: bool,
}

async fn send_test(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SentResponse>> {
    let token = state.tokens.get_valid_token(user.user_id).await?;
    state
        .notifications
        .send_text(user.user_id, &token, &test_message())
        .await?;
    Ok(Json(SentResponse { sent: true }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

async fn send_custom(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CustomMessageRequest>,
) -> Result<Json<SentResponse>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let token = state.tokens.get_valid_token(user.user_id).await?;
    state
        .notifications
        .send_text(user.user_id, &token, &escape_markdown(&req.message))
        .await?;
    Ok(Json(SentResponse { sent: true }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ErrorReportRequest {
    #[validate(length(max = 4000))]
    pub error: String,
}

async fn send_error(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ErrorReportRequest>,
) -> Result<Json<SentResponse>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if req.error.trim().is_empty() {
        return Err(AppError::BadRequest("Error message is required".to_string()));
    }

    let token = state.tokens.get_valid_token(user.user_id).await?;
    state
        .notifications
        .send_text(user.user_id, &token, &error_message(&req.error))
        .await?;
    Ok(Json(SentResponse { sent: true }))
}

/// Deliver every pending listing now.
async fn flush(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FlushReport>> {
    let token = state.tokens.get_valid_token(user.user_id).await?;
    let report = state
        .notifications
        .flush_undelivered(user.user_id, &token)
        .await?;
    Ok(Json(report))
}
