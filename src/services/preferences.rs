// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user preferences: lazy defaults, validated updates, auto-update toggle.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{PreferencesUpdate, UserPreferences};
use crate::services::bounded;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

#[derive(Clone)]
pub struct PreferencesService {
    db: Arc<dyn Store>,
    call_timeout: Duration,
}

impl PreferencesService {
    pub fn new(db: Arc<dyn Store>, call_timeout: Duration) -> Self {
        Self { db, call_timeout }
    }

    /// Stored preferences, creating and saving defaults on first access.
    pub async fn get_or_create(&self, user_id: i64) -> Result<UserPreferences, AppError> {
        let existing = bounded(self.call_timeout, self.db.get_preferences(user_id), || {
            AppError::Persistence("preferences lookup timed out".to_string())
        })
        .await?;

        if let Some(prefs) = existing {
            return Ok(prefs);
        }

        let prefs = UserPreferences::new_default(user_id, Utc::now());
        self.save(&prefs).await?;
        tracing::info!(user_id, "Created default preferences");
        Ok(prefs)
    }

    /// Validate and apply a partial update.
    pub async fn update(
        &self,
        user_id: i64,
        update: PreferencesUpdate,
    ) -> Result<UserPreferences, AppError> {
        update
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        update.check_values().map_err(AppError::BadRequest)?;

        let mut prefs = self.get_or_create(user_id).await?;
        update.apply(&mut prefs, Utc::now());
        self.save(&prefs).await?;

        tracing::info!(user_id, "Preferences updated");
        Ok(prefs)
    }

    /// Switch scheduled updates on or off for a user.
    pub async fn set_auto_update(
        &self,
        user_id: i64,
        enabled: bool,
        interval_minutes: u32,
    ) -> Result<UserPreferences, AppError> {
        self.update(
            user_id,
            PreferencesUpdate {
                auto_update_enabled: Some(enabled),
                auto_update_interval_minutes: Some(interval_minutes),
                ..Default::default()
            },
        )
        .await
    }

    /// Users opted into scheduled updates.
    pub async fn auto_update_candidates(&self) -> Result<Vec<UserPreferences>, AppError> {
        bounded(self.call_timeout, self.db.auto_update_candidates(), || {
            AppError::Persistence("candidate lookup timed out".to_string())
        })
        .await
    }

    async fn save(&self, prefs: &UserPreferences) -> Result<(), AppError> {
        bounded(self.call_timeout, self.db.save_preferences(prefs), || {
            AppError::Persistence("preferences save timed out".to_string())
        })
        .await
    }
}
