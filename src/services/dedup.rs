// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Filters freshly fetched listings down to the ones a user has not seen yet
//! and persists them.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Listing, ListingStatus};
use crate::services::bounded;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub struct ListingDeduper {
    db: Arc<dyn Store>,
    call_timeout: Duration,
}

impl ListingDeduper {
    pub fn new(db: Arc<dyn Store>, call_timeout: Duration) -> Self {
        Self { db, call_timeout }
    }

    /// Persist the candidates not already on file for `user_id` and return
    /// exactly those. Running it twice with the same input saves nothing the
    /// second time.
    ///
    /// The existing-ID lookup is a single read; if it fails every candidate is
    /// offered to the store, whose composite-key insert still rejects copies.
    pub async fn filter_and_persist(
        &self,
        user_id: i64,
        candidates: Vec<Listing>,
    ) -> Result<Vec<Listing>, AppError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let total = candidates.len();

        let existing = match bounded(
            self.call_timeout,
            self.db.listing_ids_for_user(user_id),
            || AppError::Persistence("existing-ID lookup timed out".to_string()),
        )
        .await
        {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Existing-ID lookup failed, relying on store constraint");
                HashSet::new()
            }
        };

        let now = Utc::now();
        let mut seen: HashSet<String> = HashSet::with_capacity(total);
        let fresh: Vec<Listing> = candidates
            .into_iter()
            .filter(|c| !existing.contains(&c.listing_id))
            .filter(|c| seen.insert(c.listing_id.clone()))
            .map(|mut c| {
                c.user_id = user_id;
                c.status = ListingStatus::New;
                c.delivered = false;
                c.loaded_at.get_or_insert(now);
                c
            })
            .collect();

        if fresh.is_empty() {
            tracing::debug!(user_id, total, "No new listings");
            return Ok(fresh);
        }

        let saved = bounded(
            self.call_timeout,
            self.db.insert_new_listings(&fresh),
            || AppError::Persistence("listing insert timed out".to_string()),
        )
        .await
        .inspect_err(|e| {
            tracing::error!(user_id, count = fresh.len(), error = %e, "Failed to persist new listings");
        })?;

        tracing::info!(user_id, total, saved = saved.len(), "Listings deduplicated");
        Ok(saved)
    }
}
