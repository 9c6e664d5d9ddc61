// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory per-user session tokens with transparent refresh.
//!
//! Concurrency model: tokens live in a `DashMap`; each user additionally gets
//! a `tokio::sync::Mutex` that serializes refresh, save and logout for that
//! user. There is no global lock.

use crate::error::AppError;
use crate::services::auth_client::{AuthApi, IssuedToken};
use crate::services::bounded;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tokens expiring within this window are refreshed before use.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// A cached session token.
#[derive(Debug, Clone, PartialEq)]
pub struct UserToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl UserToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

pub struct TokenCache {
    auth: Arc<dyn AuthApi>,
    tokens: DashMap<i64, UserToken>,
    locks: DashMap<i64, Arc<Mutex<()>>>,
    call_timeout: std::time::Duration,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn AuthApi>, call_timeout: std::time::Duration) -> Self {
        Self {
            auth,
            tokens: DashMap::new(),
            locks: DashMap::new(),
            call_timeout,
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return a token for `user_id` that does not expire within the refresh
    /// margin and that the auth service still accepts.
    ///
    /// Fails with `Unauthorized` when the user has no session and with
    /// `AuthUnavailable` when a needed refresh fails; in the latter case the
    /// stale session is dropped.
    pub async fn get_valid_token(&self, user_id: i64) -> Result<String, AppError> {
        // ─────────────────────────────────────────────────────────────
        // STEP 1: Check cache (fast path - no lock)
        // ─────────────────────────────────────────────────────────────
        let snapshot = self
            .tokens
            .get(&user_id)
            .map(|t| t.clone())
            .ok_or(AppError::Unauthorized)?;

        if snapshot.is_fresh(Utc::now()) {
            let valid = bounded(self.call_timeout, self.auth.validate(&snapshot.token), || {
                AppError::AuthUnavailable("token validation timed out".to_string())
            })
            .await?;

            if valid {
                return Ok(snapshot.token);
            }
            tracing::info!(user_id, "Cached token rejected by auth service, refreshing");
        } else {
            tracing::info!(user_id, "Cached token expiring, refreshing");
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 2: Acquire per-user lock
        // ─────────────────────────────────────────────────────────────
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        // ─────────────────────────────────────────────────────────────
        // STEP 3: Re-check after acquiring lock (double-check)
        // ─────────────────────────────────────────────────────────────
        let current = match self.tokens.get(&user_id).map(|t| t.clone()) {
            Some(current) => current,
            None => {
                // Logged out while we waited; do not bring the session back.
                tracing::debug!(user_id, "Session removed during refresh wait");
                return Err(AppError::Unauthorized);
            }
        };

        if current.token != snapshot.token && current.is_fresh(Utc::now()) {
            // Another task refreshed while we were waiting
            return Ok(current.token);
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 4: Refresh and store
        // ─────────────────────────────────────────────────────────────
        let refreshed = bounded(self.call_timeout, self.auth.refresh(&current.token), || {
            AppError::AuthUnavailable("token refresh timed out".to_string())
        })
        .await
        .and_then(|IssuedToken { token, expires_at }| {
            let fresh = UserToken { token, expires_at };
            if fresh.is_fresh(Utc::now()) {
                Ok(fresh)
            } else {
                Err(AppError::AuthUnavailable(format!(
                    "refreshed token expires too soon ({})",
                    expires_at
                )))
            }
        });

        match refreshed {
            Ok(fresh) => {
                self.tokens.insert(user_id, fresh.clone());
                tracing::info!(user_id, "Token refreshed and cached");
                Ok(fresh.token)
            }
            Err(e) => {
                self.tokens.remove(&user_id);
                tracing::warn!(user_id, error = %e, "Token refresh failed, session dropped");
                Err(match e {
                    AppError::AuthUnavailable(_) => e,
                    other => AppError::AuthUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Insert or replace the session for `user_id`.
    pub async fn save_token(&self, user_id: i64, token: String, expires_at: DateTime<Utc>) {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.tokens.insert(user_id, UserToken { token, expires_at });
        tracing::debug!(user_id, expires_at = %expires_at, "Session saved");
    }

    /// Log out. Waits for any in-flight refresh for the user so the refresh
    /// cannot re-insert the token afterwards. Returns whether a session existed.
    pub async fn remove_token(&self, user_id: i64) -> bool {
        let lock = self.user_lock(user_id);
        let removed = {
            let _guard = lock.lock().await;
            self.tokens.remove(&user_id).is_some()
        };
        drop(lock);
        self.prune_lock(user_id);
        removed
    }

    /// Drop every session whose expiry has passed. Users with a refresh in
    /// flight are skipped until the next sweep. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<i64> = self
            .tokens
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for user_id in expired {
            let lock = self.user_lock(user_id);
            let Ok(guard) = lock.try_lock() else {
                tracing::debug!(user_id, "Refresh in flight, skipping sweep");
                continue;
            };
            if self
                .tokens
                .remove_if(&user_id, |_, t| t.expires_at <= now)
                .is_some()
            {
                removed += 1;
            }
            drop(guard);
            drop(lock);
            self.prune_lock(user_id);
        }

        if removed > 0 {
            tracing::info!(removed, remaining = self.tokens.len(), "Expired sessions swept");
        }
        removed
    }

    /// Forget the per-user lock when nobody else holds a handle to it.
    fn prune_lock(&self, user_id: i64) {
        if self.tokens.contains_key(&user_id) {
            return;
        }
        self.locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn has_session(&self, user_id: i64) -> bool {
        self.tokens.contains_key(&user_id)
    }

    /// Cached entry, if any.
    pub fn peek(&self, user_id: i64) -> Option<UserToken> {
        self.tokens.get(&user_id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
