// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic auto-update sweep and session maintenance.
//!
//! Each tick walks every user with auto-update enabled, with bounded
//! parallelism. A failure (or panic) for one user is logged and never stops
//! the others. Ticks do not overlap: a tick that fires while the previous one
//! is still running is skipped.

use crate::error::AppError;
use crate::models::{SearchRequest, UserPreferences};
use crate::services::auth_client::AuthApi;
use crate::services::bounded;
use crate::services::preferences::PreferencesService;
use crate::services::token_cache::TokenCache;
use crate::services::vacancy::VacancyService;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::{stream, FutureExt, StreamExt};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Counts for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Users with auto-update enabled
    pub candidates: usize,
    pub updated: usize,
    /// Interval since last successful run not yet elapsed
    pub not_due: usize,
    /// No token could be obtained
    pub auth_skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Previous tick still running
    Skipped,
    Completed(TickReport),
}

enum UserRun {
    Updated,
    NotDue,
    AuthSkipped,
}

pub struct AutoUpdateScheduler {
    preferences: PreferencesService,
    tokens: Arc<TokenCache>,
    auth: Arc<dyn AuthApi>,
    vacancies: Arc<VacancyService>,
    running: Mutex<()>,
    last_run: DashMap<i64, DateTime<Utc>>,
    concurrency: usize,
    call_timeout: std::time::Duration,
}

impl AutoUpdateScheduler {
    pub fn new(
        preferences: PreferencesService,
        tokens: Arc<TokenCache>,
        auth: Arc<dyn AuthApi>,
        vacancies: Arc<VacancyService>,
        concurrency: usize,
        call_timeout: std::time::Duration,
    ) -> Self {
        Self {
            preferences,
            tokens,
            auth,
            vacancies,
            running: Mutex::new(()),
            last_run: DashMap::new(),
            concurrency: concurrency.max(1),
            call_timeout,
        }
    }

    /// Run one sweep over all auto-update users.
    pub async fn run_tick(&self) -> TickOutcome {
        let Ok(_guard) = self.running.try_lock() else {
            tracing::warn!("Previous auto-update tick still running, skipping");
            return TickOutcome::Skipped;
        };

        let started = std::time::Instant::now();
        let users = match self.preferences.auto_update_candidates().await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load auto-update users");
                Vec::new()
            }
        };

        let now = Utc::now();
        let mut report = TickReport {
            candidates: users.len(),
            ..Default::default()
        };
        let active: HashSet<i64> = users.iter().map(|p| p.user_id).collect();

        let results: Vec<_> = stream::iter(users)
            .map(|prefs| async move {
                let user_id = prefs.user_id;
                let outcome = AssertUnwindSafe(self.run_user(&prefs, now))
                    .catch_unwind()
                    .await;
                (user_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (user_id, outcome) in results {
            match outcome {
                Ok(Ok(UserRun::Updated)) => report.updated += 1,
                Ok(Ok(UserRun::NotDue)) => report.not_due += 1,
                Ok(Ok(UserRun::AuthSkipped)) => report.auth_skipped += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(user_id, error = %e, "Auto-update failed for user");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!(user_id, "Auto-update panicked for user");
                }
            }
        }

        // Forget users who switched auto-update off.
        self.last_run.retain(|user_id, _| active.contains(user_id));

        tracing::info!(
            candidates = report.candidates,
            updated = report.updated,
            not_due = report.not_due,
            auth_skipped = report.auth_skipped,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Auto-update tick complete"
        );
        TickOutcome::Completed(report)
    }

    async fn run_user(
        &self,
        prefs: &UserPreferences,
        now: DateTime<Utc>,
    ) -> Result<UserRun, AppError> {
        let user_id = prefs.user_id;
        if !self.is_due(user_id, prefs.auto_update_interval_minutes, now) {
            return Ok(UserRun::NotDue);
        }

        let token = match self.token_for(user_id).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "No token for auto-update, skipping user");
                return Ok(UserRun::AuthSkipped);
            }
        };

        self.vacancies
            .search_with_preferences(user_id, &token, prefs, &SearchRequest::default())
            .await?;

        self.last_run.insert(user_id, now);
        Ok(UserRun::Updated)
    }

    fn is_due(&self, user_id: i64, interval_minutes: u32, now: DateTime<Utc>) -> bool {
        match self.last_run.get(&user_id) {
            Some(last) => now - *last >= Duration::minutes(i64::from(interval_minutes)),
            None => true,
        }
    }

    /// The user's cached session if there is one, otherwise a one-off token
    /// for this run. One-off tokens are not cached, so background work never
    /// restores a session the user logged out of.
    async fn token_for(&self, user_id: i64) -> Result<String, AppError> {
        if self.tokens.has_session(user_id) {
            match self.tokens.get_valid_token(user_id).await {
                Ok(token) => return Ok(token),
                // Logged out in the meantime
                Err(AppError::Unauthorized) => {}
                Err(e) => return Err(e),
            }
        }

        bounded(self.call_timeout, self.auth.issue_token(user_id), || {
            AppError::AuthUnavailable("token issue timed out".to_string())
        })
        .await
        .map(|issued| issued.token)
    }

    /// Sweep expired sessions. Returns the number removed.
    pub fn run_maintenance(&self) -> usize {
        let sessions = self.tokens.sweep_expired();
        tracing::debug!(sessions, "Maintenance sweep complete");
        sessions
    }

    /// Register the periodic jobs and start the timer. Ticks fire on a fixed
    /// period regardless of how long the previous one took.
    pub async fn start(
        self: Arc<Self>,
        tick_every: std::time::Duration,
        maintenance_every: std::time::Duration,
    ) -> Result<JobScheduler, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create scheduler: {}", e)))?;

        let this = self.clone();
        let tick_job = Job::new_repeated_async(tick_every, move |_uuid, _l| {
            let this = this.clone();
            Box::pin(async move {
                this.run_tick().await;
            })
        })
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create tick job: {}", e)))?;

        let this = self.clone();
        let maintenance_job = Job::new_repeated_async(maintenance_every, move |_uuid, _l| {
            let this = this.clone();
            Box::pin(async move {
                this.run_maintenance();
            })
        })
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create maintenance job: {}", e))
        })?;

        for job in [tick_job, maintenance_job] {
            scheduler
                .add(job)
                .await
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to add job: {}", e)))?;
        }

        scheduler
            .start()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to start scheduler: {}", e)))?;

        tracing::info!(
            tick_secs = tick_every.as_secs(),
            maintenance_secs = maintenance_every.as_secs(),
            "Auto-update scheduler started"
        );
        Ok(scheduler)
    }
}
