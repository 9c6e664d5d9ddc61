// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Preference routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AutoUpdateRequest, PreferencesUpdate, UserPreferences};
use crate::services::notifications::settings_updated_message;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/auto-update", post(setup_auto_update))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserPreferences>> {
    Ok(Json(state.preferences.get_or_create(user.user_id).await?))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<UserPreferences>> {
    let prefs = state.preferences.update(user.user_id, update).await?;

    // Best effort: a failed notice must not fail the update.
    if prefs.notify_enabled {
        match state.tokens.get_valid_token(user.user_id).await {
            Ok(token) => {
                let _ = state
                    .notifications
                    .send_text(user.user_id, &token, &settings_updated_message(&prefs))
                    .await;
            }
            Err(e) => {
                tracing::debug!(user_id = user.user_id, error = %e, "No session for settings notice");
            }
        }
    }

    Ok(Json(prefs))
}

async fn setup_auto_update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AutoUpdateRequest>,
) -> Result<Json<UserPreferences>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let prefs = state
        .preferences
        .set_auto_update(user.user_id, req.enabled, req.interval_minutes)
        .await?;

    tracing::info!(
        user_id = user.user_id,
        enabled = prefs.auto_update_enabled,
        interval_minutes = prefs.auto_update_interval_minutes,
        "Auto-update configured"
    );
    Ok(Json(prefs))
}
