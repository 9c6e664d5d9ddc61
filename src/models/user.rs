//! User-facing records returned by the auth service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Profile of the authenticated Telegram user (`GET /api/auth/me`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    /// Telegram user ID (also our user key)
    pub telegram_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

/// Subscription state (`GET /api/subscription/status`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionStatus {
    pub telegram_id: Option<i64>,
    pub subscription_end_date: Option<NaiveDate>,
    pub subscription_plan: Option<String>,
    pub active: bool,
    pub days_remaining: i64,
    pub trial_used: bool,
}
