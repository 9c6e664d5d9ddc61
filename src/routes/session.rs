// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: establish, inspect and end the cached auth-service session.

use crate::error::{AppError, Result};
use crate::middleware::auth::{verify_token, AuthUser};
use crate::models::{SubscriptionStatus, UserProfile};
use crate::services::auth_client::DEFAULT_SESSION_TTL_HOURS;
use crate::services::bounded;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Routes reachable without a JWT.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/session/init", post(init_session))
}

/// Routes that require a JWT (middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session/info", get(session_info))
        .route("/session/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub struct InitSessionRequest {
    pub token: String,
    /// Optional; must match the token's user when present
    #[serde(default)]
    pub telegram_id: Option<i64>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user_id: i64,
    pub expires_at: String,
}

/// Validate a token with the auth service and cache it as the user's session.
async fn init_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitSessionRequest>,
) -> Result<Json<SessionResponse>> {
    let token = req.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }

    let timeout = state.config.collaborator_timeout;
    let valid = bounded(timeout, state.auth.validate(token), || {
        AppError::AuthUnavailable("token validation timed out".to_string())
    })
    .await?;
    if !valid {
        return Err(AppError::InvalidToken);
    }

    // Tokens we can verify locally carry their own user and expiry;
    // otherwise ask the auth service who this is.
    let (user_id, expires_at) = match verify_token(token, &state.config.jwt_signing_key) {
        Some(user) => (user.user_id, user.expires_at),
        None => {
            let profile = bounded(timeout, state.auth.profile(token), || {
                AppError::AuthUnavailable("profile lookup timed out".to_string())
            })
            .await?;
            let user_id = profile
                .telegram_id
                .ok_or_else(|| AppError::BadRequest("token has no Telegram user".to_string()))?;
            (
                user_id,
                Utc::now() + Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            )
        }
    };

    if let Some(claimed) = req.telegram_id {
        if claimed != user_id {
            tracing::warn!(claimed, user_id, "Session init with mismatched telegram_id");
            return Err(AppError::BadRequest(
                "telegram_id does not match token".to_string(),
            ));
        }
    }

    state
        .tokens
        .save_token(user_id, token.to_string(), expires_at)
        .await;
    tracing::info!(user_id, "Session initialized");

    Ok(Json(SessionResponse {
        user_id,
        expires_at: format_utc_rfc3339(expires_at),
    }))
}

#[derive(Serialize)]
pub struct SessionInfoResponse {
    pub user_id: i64,
    pub profile: UserProfile,
    pub subscription: SubscriptionStatus,
}

async fn session_info(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SessionInfoResponse>> {
    let token = state.tokens.get_valid_token(user.user_id).await?;
    let timeout = state.config.collaborator_timeout;

    let (profile, subscription) = tokio::try_join!(
        bounded(timeout, state.auth.profile(&token), || {
            AppError::AuthUnavailable("profile lookup timed out".to_string())
        }),
        bounded(timeout, state.auth.subscription_status(&token), || {
            AppError::AuthUnavailable("subscription lookup timed out".to_string())
        }),
    )?;

    Ok(Json(SessionInfoResponse {
        user_id: user.user_id,
        profile,
        subscription,
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<LogoutResponse> {
    let logged_out = state.tokens.remove_token(user.user_id).await;
    tracing::info!(user_id = user.user_id, logged_out, "Session ended");
    Json(LogoutResponse { logged_out })
}
