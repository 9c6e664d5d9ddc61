// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the auth microservice.
//!
//! Handles:
//! - Token issue, validation and refresh
//! - Profile and subscription lookups
//! - Outbound Telegram messages (the bot notify endpoint lives on the same service)

use crate::error::AppError;
use crate::models::{SubscriptionStatus, UserProfile};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session lifetime assumed when the auth service omits an expiry.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// A bearer token together with its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Token issue/validate/refresh plus the profile lookups.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Issue a token for a Telegram user without an existing session.
    async fn issue_token(&self, user_id: i64) -> Result<IssuedToken, AppError>;

    /// Whether the auth service still accepts `token`.
    async fn validate(&self, token: &str) -> Result<bool, AppError>;

    /// Exchange `token` for a fresh one.
    async fn refresh(&self, token: &str) -> Result<IssuedToken, AppError>;

    async fn profile(&self, token: &str) -> Result<UserProfile, AppError>;

    async fn subscription_status(&self, token: &str) -> Result<SubscriptionStatus, AppError>;
}

/// Outbound messaging channel to a user.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver `text` to the user identified by `token`.
    async fn send(&self, token: &str, text: &str) -> Result<(), AppError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl From<TokenResponse> for IssuedToken {
    fn from(resp: TokenResponse) -> Self {
        Self {
            token: resp.token,
            expires_at: resp
                .expires_at
                .unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_SESSION_TTL_HOURS)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

#[derive(Serialize)]
struct NotifyRequest<'a> {
    message: &'a str,
}

/// HTTP client for the auth service.
#[derive(Clone)]
pub struct AuthServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl AuthServiceClient {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Generic GET with bearer auth and JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::AuthUnavailable(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Check response status and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AppError::InvalidToken);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::AuthUnavailable(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::AuthUnavailable(format!("JSON parse error: {}", e)))
}

#[async_trait]
impl AuthApi for AuthServiceClient {
    async fn issue_token(&self, user_id: i64) -> Result<IssuedToken, AppError> {
        let response = self
            .http
            .post(self.url("/api/auth/token"))
            .query(&[("telegramId", user_id)])
            .send()
            .await
            .map_err(|e| AppError::AuthUnavailable(format!("Token request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await.map_err(|e| match e {
            AppError::InvalidToken => {
                AppError::AuthUnavailable(format!("Token refused for user {}", user_id))
            }
            other => other,
        })?;
        Ok(token.into())
    }

    async fn validate(&self, token: &str) -> Result<bool, AppError> {
        match self.get_json::<ValidateResponse>("/api/auth/validate", token).await {
            Ok(resp) => Ok(resp.valid),
            Err(AppError::InvalidToken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn refresh(&self, token: &str) -> Result<IssuedToken, AppError> {
        let response = self
            .http
            .post(self.url("/api/auth/refresh"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::AuthUnavailable(format!("Token refresh request failed: {}", e)))?;

        let token: TokenResponse = check_response_json(response).await.map_err(|e| match e {
            AppError::InvalidToken => AppError::AuthUnavailable("Refresh rejected".to_string()),
            other => other,
        })?;
        Ok(token.into())
    }

    async fn profile(&self, token: &str) -> Result<UserProfile, AppError> {
        self.get_json("/api/auth/me", token).await
    }

    async fn subscription_status(&self, token: &str) -> Result<SubscriptionStatus, AppError> {
        self.get_json("/api/subscription/status", token).await
    }
}

#[async_trait]
impl Messenger for AuthServiceClient {
    async fn send(&self, token: &str, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.url("/api/bot/notify"))
            .bearer_auth(token)
            .json(&NotifyRequest { message: text })
            .send()
            .await
            .map_err(|e| AppError::Messaging(format!("Notify request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Messaging(format!("HTTP {}: {}", status, body)));
        }
        Ok(())
    }
}
