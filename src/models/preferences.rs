// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user search preferences and the search request merge rule.

use crate::time_utils::rfc3339_secs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

pub const DEFAULT_QUERY: &str = "Python developer";
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

/// Accepted values for `work_types`.
pub const WORK_TYPES: &[&str] = &["remote", "office", "hybrid"];
/// Accepted values for `countries`.
pub const COUNTRIES: &[&str] = &["russia", "belarus"];
pub const THEMES: &[&str] = &["light", "dark"];

/// Stored preferences, one document per user (keyed by user ID).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: i64,
    pub query_text: String,
    pub lookback_days: u32,
    /// Comma-separated keywords excluded from search
    #[serde(default)]
    pub exclude_keywords: String,
    pub work_types: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub notify_enabled: bool,
    pub auto_update_enabled: bool,
    pub auto_update_interval_minutes: u32,
    pub theme: String,
    #[serde(with = "rfc3339_secs")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_secs")]
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    /// Defaults used when a user is first seen.
    pub fn new_default(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            query_text: DEFAULT_QUERY.to_string(),
            lookback_days: 1,
            exclude_keywords: String::new(),
            work_types: BTreeSet::from(["remote".to_string()]),
            countries: BTreeSet::from(["russia".to_string()]),
            notify_enabled: false,
            auto_update_enabled: false,
            auto_update_interval_minutes: DEFAULT_INTERVAL_MINUTES,
            theme: "light".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Search parameters supplied with an interactive search. Any field left
/// empty falls back to the stored preferences.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SearchRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub query: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 30))]
    pub lookback_days: Option<u32>,
    #[serde(default)]
    pub work_types: Option<BTreeSet<String>>,
    #[serde(default)]
    pub countries: Option<BTreeSet<String>>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub exclude_keywords: Option<String>,
    #[serde(default)]
    pub notify: Option<bool>,
}

/// Fully resolved search, ready for the search collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    pub lookback_days: u32,
    pub exclude_keywords: Vec<String>,
    pub work_types: BTreeSet<String>,
    pub countries: BTreeSet<String>,
    pub notify: bool,
}

impl SearchRequest {
    /// Merge with stored preferences: explicit, non-empty request values win.
    pub fn merge_with(&self, prefs: &UserPreferences) -> SearchQuery {
        let text = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(prefs.query_text.as_str())
            .to_string();

        let exclude = self
            .exclude_keywords
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(prefs.exclude_keywords.as_str());

        SearchQuery {
            text,
            lookback_days: self.lookback_days.unwrap_or(prefs.lookback_days),
            exclude_keywords: split_keywords(exclude),
            work_types: non_empty_or(&self.work_types, &prefs.work_types),
            countries: non_empty_or(&self.countries, &prefs.countries),
            notify: self.notify.unwrap_or(prefs.notify_enabled),
        }
    }
}

fn non_empty_or(value: &Option<BTreeSet<String>>, fallback: &BTreeSet<String>) -> BTreeSet<String> {
    match value {
        Some(set) if !set.is_empty() => set.clone(),
        _ => fallback.clone(),
    }
}

/// Split a comma-separated keyword list, dropping blanks.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Partial update of stored preferences (`PUT /settings`).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PreferencesUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200))]
    pub query_text: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 30))]
    pub lookback_days: Option<u32>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub exclude_keywords: Option<String>,
    #[serde(default)]
    pub work_types: Option<BTreeSet<String>>,
    #[serde(default)]
    pub countries: Option<BTreeSet<String>>,
    #[serde(default)]
    pub notify_enabled: Option<bool>,
    #[serde(default)]
    pub auto_update_enabled: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 1, max = 1440))]
    pub auto_update_interval_minutes: Option<u32>,
    #[serde(default)]
    pub theme: Option<String>,
}

impl PreferencesUpdate {
    /// Check values the derive cannot: a query that is not blank once
    /// trimmed, and set-valued fields against the accepted vocabularies.
    pub fn check_values(&self) -> Result<(), String> {
        if self
            .query_text
            .as_deref()
            .is_some_and(|q| q.trim().is_empty())
        {
            return Err("query_text: must not be blank".to_string());
        }
        if let Some(types) = &self.work_types {
            check_members("work_types", types, WORK_TYPES)?;
        }
        if let Some(countries) = &self.countries {
            check_members("countries", countries, COUNTRIES)?;
        }
        if let Some(theme) = &self.theme {
            if !THEMES.contains(&theme.as_str()) {
                return Err(format!("theme: unsupported value {:?}", theme));
            }
        }
        Ok(())
    }

    /// Apply onto `prefs`, leaving absent fields untouched.
    pub fn apply(self, prefs: &mut UserPreferences, now: DateTime<Utc>) {
        if let Some(q) = self.query_text {
            prefs.query_text = q.trim().to_string();
        }
        if let Some(days) = self.lookback_days {
            prefs.lookback_days = days;
        }
        if let Some(ex) = self.exclude_keywords {
            prefs.exclude_keywords = ex;
        }
        if let Some(types) = self.work_types {
            prefs.work_types = types;
        }
        if let Some(countries) = self.countries {
            prefs.countries = countries;
        }
        if let Some(notify) = self.notify_enabled {
            prefs.notify_enabled = notify;
        }
        if let Some(enabled) = self.auto_update_enabled {
            prefs.auto_update_enabled = enabled;
        }
        if let Some(interval) = self.auto_update_interval_minutes {
            prefs.auto_update_interval_minutes = interval;
        }
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        prefs.updated_at = now;
    }
}

fn check_members(field: &str, values: &BTreeSet<String>, allowed: &[&str]) -> Result<(), String> {
    match values.iter().find(|v| !allowed.contains(&v.as_str())) {
        Some(bad) => Err(format!("{}: unsupported value {:?}", field, bad)),
        None => Ok(()),
    }
}

/// Body of `POST /settings/auto-update`. Both fields are required.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AutoUpdateRequest {
    pub enabled: bool,
    #[validate(range(min = 1, max = 1440))]
    pub interval_minutes: u32,
}
