// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process `Store` used for local runs (`STORAGE_BACKEND=memory`) and tests.
//!
//! Listings live in one map entry per user; DashMap's entry lock makes each
//! bulk operation atomic for that user, which gives the same
//! insert-if-absent guarantee as the Firestore precondition.

use crate::db::Store;
use crate::error::AppError;
use crate::models::{Listing, ListingStatus, UserPreferences};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryDb {
    /// user_id → (listing_id → listing)
    listings: DashMap<i64, BTreeMap<String, Listing>>,
    preferences: DashMap<i64, UserPreferences>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail, for exercising degraded paths.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail, for exercising degraded paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("simulated write failure".to_string()));
        }
        Ok(())
    }

    fn update_where(
        &self,
        user_id: i64,
        listing_ids: &[String],
        mut apply: impl FnMut(&mut Listing),
    ) -> usize {
        let Some(mut user_listings) = self.listings.get_mut(&user_id) else {
            return 0;
        };
        let mut updated = 0;
        for id in listing_ids {
            if let Some(listing) = user_listings.get_mut(id) {
                apply(listing);
                updated += 1;
            }
        }
        updated
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn listing_ids_for_user(&self, user_id: i64) -> Result<HashSet<String>, AppError> {
        self.check_read()?;
        Ok(self
            .listings
            .get(&user_id)
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_new_listings(&self, listings: &[Listing]) -> Result<Vec<Listing>, AppError> {
        self.check_write()?;
        let mut by_user: BTreeMap<i64, Vec<&Listing>> = BTreeMap::new();
        for listing in listings {
            by_user.entry(listing.user_id).or_default().push(listing);
        }

        let mut inserted = Vec::new();
        for (user_id, batch) in by_user {
            // One entry guard per user covers the whole batch
            let mut user_listings = self.listings.entry(user_id).or_default();
            for listing in batch {
                if user_listings.contains_key(&listing.listing_id) {
                    continue;
                }
                user_listings.insert(listing.listing_id.clone(), listing.clone());
                inserted.push(listing.clone());
            }
        }
        Ok(inserted)
    }

    async fn undelivered_listings(&self, user_id: i64) -> Result<Vec<Listing>, AppError> {
        self.check_read()?;
        let mut pending: Vec<Listing> = self
            .listings
            .get(&user_id)
            .map(|l| l.values().filter(|v| !v.delivered).cloned().collect())
            .unwrap_or_default();
        pending.sort_by_key(|l| l.published_at);
        Ok(pending)
    }

    async fn mark_delivered(
        &self,
        user_id: i64,
        listing_ids: &[String],
    ) -> Result<usize, AppError> {
        self.check_write()?;
        Ok(self.update_where(user_id, listing_ids, |l| l.delivered = true))
    }

    async fn listings_for_user(
        &self,
        user_id: i64,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, AppError> {
        self.check_read()?;
        let mut listings: Vec<Listing> = self
            .listings
            .get(&user_id)
            .map(|l| {
                l.values()
                    .filter(|v| status.map_or(true, |s| v.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        listings.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(listings)
    }

    async fn update_status(
        &self,
        user_id: i64,
        listing_ids: &[String],
        status: ListingStatus,
    ) -> Result<usize, AppError> {
        self.check_write()?;
        Ok(self.update_where(user_id, listing_ids, |l| l.status = status))
    }

    async fn delete_listing(&self, user_id: i64, listing_id: &str) -> Result<bool, AppError> {
        self.check_write()?;
        Ok(self
            .listings
            .get_mut(&user_id)
            .is_some_and(|mut l| l.remove(listing_id).is_some()))
    }

    async fn delete_all_listings(&self, user_id: i64) -> Result<usize, AppError> {
        self.check_write()?;
        Ok(self
            .listings
            .remove(&user_id)
            .map(|(_, l)| l.len())
            .unwrap_or(0))
    }

    async fn count_new(&self, user_id: i64) -> Result<u64, AppError> {
        self.check_read()?;
        Ok(self
            .listings
            .get(&user_id)
            .map(|l| {
                l.values()
                    .filter(|v| v.status == ListingStatus::New)
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, AppError> {
        self.check_read()?;
        Ok(self.preferences.get(&user_id).map(|p| p.clone()))
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError> {
        self.check_write()?;
        self.preferences.insert(prefs.user_id, prefs.clone());
        Ok(())
    }

    async fn auto_update_candidates(&self) -> Result<Vec<UserPreferences>, AppError> {
        self.check_read()?;
        let mut users: Vec<UserPreferences> = self
            .preferences
            .iter()
            .filter(|p| p.auto_update_enabled)
            .map(|p| p.clone())
            .collect();
        users.sort_by_key(|p| p.user_id);
        Ok(users)
    }
}
