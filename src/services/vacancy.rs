// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Search pipeline and listing management.
//!
//! One pipeline serves both the interactive search endpoint and the
//! scheduler: merge request with preferences → search → dedup → flush.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Listing, ListingStatus, NewListing, SearchRequest, UserPreferences};
use crate::services::bounded;
use crate::services::dedup::ListingDeduper;
use crate::services::notifications::{FlushReport, NotificationBatcher};
use crate::services::preferences::PreferencesService;
use crate::services::search::VacancySearch;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Result of one search pass for a user.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    /// Listings returned by the job board
    pub found: usize,
    /// Newly stored listings
    pub saved: Vec<Listing>,
    /// Set when notifications were requested and the flush ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush: Option<FlushReport>,
}

/// Result of a client-side listing import.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
    pub total_processed: usize,
}

pub struct VacancyService {
    db: Arc<dyn Store>,
    search: Arc<dyn VacancySearch>,
    preferences: PreferencesService,
    deduper: ListingDeduper,
    batcher: Arc<NotificationBatcher>,
    call_timeout: Duration,
}

impl VacancyService {
    pub fn new(
        db: Arc<dyn Store>,
        search: Arc<dyn VacancySearch>,
        preferences: PreferencesService,
        batcher: Arc<NotificationBatcher>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            deduper: ListingDeduper::new(db.clone(), call_timeout),
            db,
            search,
            preferences,
            batcher,
            call_timeout,
        }
    }

    /// Interactive search: request fields override the stored preferences.
    pub async fn search(
        &self,
        user_id: i64,
        token: &str,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, AppError> {
        request
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let prefs = self.preferences.get_or_create(user_id).await?;
        self.search_with_preferences(user_id, token, &prefs, request)
            .await
    }

    /// Run the pipeline against already loaded preferences.
    pub async fn search_with_preferences(
        &self,
        user_id: i64,
        token: &str,
        prefs: &UserPreferences,
        request: &SearchRequest,
    ) -> Result<SearchOutcome, AppError> {
        let query = request.merge_with(prefs);

        let raw = bounded(self.call_timeout, self.search.search(&query), || {
            AppError::UpstreamSearch("search timed out".to_string())
        })
        .await?;

        let now = Utc::now();
        let candidates: Vec<Listing> = raw
            .into_iter()
            .filter_map(|item| item.into_listing(user_id, now))
            .collect();
        let found = candidates.len();

        let saved = self.deduper.filter_and_persist(user_id, candidates).await?;

        let flush = if query.notify {
            match self.batcher.flush_undelivered(user_id, token).await {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Flush after search failed");
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(user_id, found, saved = saved.len(), "Search pass complete");
        Ok(SearchOutcome { found, saved, flush })
    }

    // ─── Listing Management ──────────────────────────────────────

    /// Store client-supplied listings, skipping ones already on file.
    pub async fn import(
        &self,
        user_id: i64,
        listings: Vec<NewListing>,
    ) -> Result<ImportReport, AppError> {
        for listing in &listings {
            listing
                .validate()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
        }

        let total = listings.len();
        let now = Utc::now();
        let candidates = listings
            .into_iter()
            .map(|l| l.into_listing(user_id, now))
            .collect();
        let added = self.deduper.filter_and_persist(user_id, candidates).await?.len();

        Ok(ImportReport {
            added,
            skipped: total - added,
            total_processed: total,
        })
    }

    pub async fn list(
        &self,
        user_id: i64,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, AppError> {
        self.bounded_db(self.db.listings_for_user(user_id, status))
            .await
    }

    /// Mark listings as viewed. Returns how many were updated.
    pub async fn mark_viewed(&self, user_id: i64, listing_ids: &[String]) -> Result<usize, AppError> {
        if listing_ids.is_empty() {
            return Ok(0);
        }
        self.bounded_db(
            self.db
                .update_status(user_id, listing_ids, ListingStatus::Viewed),
        )
        .await
    }

    pub async fn delete(&self, user_id: i64, listing_id: &str) -> Result<(), AppError> {
        let existed = self
            .bounded_db(self.db.delete_listing(user_id, listing_id))
            .await?;
        if !existed {
            return Err(AppError::NotFound(format!("Listing {}", listing_id)));
        }
        Ok(())
    }

    pub async fn delete_all(&self, user_id: i64) -> Result<usize, AppError> {
        let count = self.bounded_db(self.db.delete_all_listings(user_id)).await?;
        tracing::info!(user_id, count, "All listings deleted");
        Ok(count)
    }

    pub async fn count_new(&self, user_id: i64) -> Result<u64, AppError> {
        self.bounded_db(self.db.count_new(user_id)).await
    }

    async fn bounded_db<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        bounded(self.call_timeout, call, || {
            AppError::Persistence("storage call timed out".to_string())
        })
        .await
    }
}
