//! Persistence layer: the `Store` trait plus Firestore and in-memory backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Listing, ListingStatus, UserPreferences};
use async_trait::async_trait;
use std::collections::HashSet;

/// Collection names as constants.
pub mod collections {
    pub const LISTINGS: &str = "listings";
    /// User preferences (keyed by user_id)
    pub const PREFERENCES: &str = "user_preferences";
}

/// Durable storage for listings and preferences.
///
/// Bulk operations are a single round trip per call (up to backend limits).
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Listings ────────────────────────────────────────────────

    /// IDs of every listing on file for a user.
    async fn listing_ids_for_user(&self, user_id: i64) -> Result<HashSet<String>, AppError>;

    /// Insert listings whose `(listing_id, user_id)` is not yet stored.
    /// Rows that already exist are skipped; returns exactly the rows written.
    async fn insert_new_listings(&self, listings: &[Listing]) -> Result<Vec<Listing>, AppError>;

    /// Undelivered listings for a user, oldest `published_at` first.
    async fn undelivered_listings(&self, user_id: i64) -> Result<Vec<Listing>, AppError>;

    /// Set `delivered = true` on the given listings. Returns how many were updated.
    async fn mark_delivered(&self, user_id: i64, listing_ids: &[String])
        -> Result<usize, AppError>;

    /// Listings for a user, newest `published_at` first.
    async fn listings_for_user(
        &self,
        user_id: i64,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, AppError>;

    /// Set the review status of the given listings. Returns how many were updated.
    async fn update_status(
        &self,
        user_id: i64,
        listing_ids: &[String],
        status: ListingStatus,
    ) -> Result<usize, AppError>;

    /// Delete one listing. Returns whether it existed.
    async fn delete_listing(&self, user_id: i64, listing_id: &str) -> Result<bool, AppError>;

    /// Delete every listing of a user. Returns the count removed.
    async fn delete_all_listings(&self, user_id: i64) -> Result<usize, AppError>;

    async fn count_new(&self, user_id: i64) -> Result<u64, AppError>;

    // ─── Preferences ─────────────────────────────────────────────

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, AppError>;

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError>;

    /// Preferences of every user with auto-update switched on.
    async fn auto_update_candidates(&self) -> Result<Vec<UserPreferences>, AppError>;
}
