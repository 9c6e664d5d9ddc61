// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed `Store`.
//!
//! Collections:
//! - `listings` (document ID `{user_id}_{listing_id}`)
//! - `user_preferences` (document ID `{user_id}`)

use crate::db::{collections, Store};
use crate::error::AppError;
use crate::models::{Listing, ListingStatus, UserPreferences};
use async_trait::async_trait;
use firestore::{FirestoreQueryDirection, FirestoreTransaction, FirestoreWritePrecondition};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Partial document written when a listing is delivered.
#[derive(Serialize, Deserialize)]
struct DeliveredPatch {
    delivered: bool,
}

#[derive(Serialize, Deserialize)]
struct StatusPatch {
    status: ListingStatus,
}

#[derive(Deserialize)]
struct ListingIdOnly {
    listing_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Persistence(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Offline client; every operation returns a persistence error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Persistence("Database not connected (offline mode)".to_string())
        })
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Commit writes in transactions of at most `BATCH_SIZE` operations.
    async fn write_in_transactions<T, F>(&self, items: &[T], add: F) -> Result<(), AppError>
    where
        T: Sync,
        F: Fn(&firestore::FirestoreDb, &T, &mut FirestoreTransaction<'_>) -> Result<(), AppError>
            + Sync,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client.begin_transaction().await.map_err(|e| {
                AppError::Persistence(format!("Failed to begin transaction: {}", e))
            })?;

            for item in chunk {
                add(client, item, &mut transaction)?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Persistence(format!("Transaction commit failed: {}", e))
            })?;
        }

        Ok(())
    }

    async fn query_listings(
        &self,
        user_id: i64,
        status: Option<ListingStatus>,
        direction: FirestoreQueryDirection,
    ) -> Result<Vec<Listing>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LISTINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                ])
            })
            .order_by([("published_at", direction)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    /// Create listing documents that must not exist yet.
    async fn create_listings(&self, listings: &[Listing]) -> Result<(), AppError> {
        self.write_in_transactions(listings, |client, listing, tx| {
            client
                .fluent()
                .update()
                .in_col(collections::LISTINGS)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(listing.document_id())
                .object(listing)
                .add_to_transaction(tx)
                .map_err(|e| AppError::Persistence(format!("Failed to stage insert: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Drop listings whose `(user_id, listing_id)` is already stored.
    async fn without_existing(&self, listings: &[Listing]) -> Result<Vec<Listing>, AppError> {
        let users: HashSet<i64> = listings.iter().map(|l| l.user_id).collect();
        let mut known: HashSet<(i64, String)> = HashSet::new();
        for user_id in users {
            for id in self.listing_ids_for_user(user_id).await? {
                known.insert((user_id, id));
            }
        }

        Ok(listings
            .iter()
            .filter(|l| !known.contains(&(l.user_id, l.listing_id.clone())))
            .cloned()
            .collect())
    }

    /// Write a single-field patch onto existing listing documents.
    async fn patch_listings<P: Serialize + for<'de> Deserialize<'de> + Send + Sync>(
        &self,
        user_id: i64,
        listing_ids: &[String],
        field: &'static str,
        patch: &P,
    ) -> Result<(), AppError> {
        self.write_in_transactions(listing_ids, |client, id, tx| {
            client
                .fluent()
                .update()
                .fields([field])
                .in_col(collections::LISTINGS)
                .precondition(FirestoreWritePrecondition::Exists(true))
                .document_id(Listing::document_id_for(user_id, id))
                .object(patch)
                .add_to_transaction(tx)
                .map_err(|e| AppError::Persistence(format!("Failed to stage patch: {}", e)))?;
            Ok(())
        })
        .await
    }

    /// Patch listings, retrying once against the IDs that still exist if the
    /// first commit lost a race with a delete.
    async fn patch_existing<P: Serialize + for<'de> Deserialize<'de> + Send + Sync>(
        &self,
        user_id: i64,
        listing_ids: &[String],
        field: &'static str,
        patch: &P,
    ) -> Result<usize, AppError> {
        if listing_ids.is_empty() {
            return Ok(0);
        }

        match self.patch_listings(user_id, listing_ids, field, patch).await {
            Ok(()) => Ok(listing_ids.len()),
            Err(e) => {
                tracing::warn!(user_id, field, error = %e, "Patch failed, retrying on existing listings");
                let existing = self.listing_ids_for_user(user_id).await?;
                let remaining: Vec<String> = listing_ids
                    .iter()
                    .filter(|id| existing.contains(*id))
                    .cloned()
                    .collect();
                self.patch_listings(user_id, &remaining, field, patch).await?;
                Ok(remaining.len())
            }
        }
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Listing Operations ──────────────────────────────────────

    async fn listing_ids_for_user(&self, user_id: i64) -> Result<HashSet<String>, AppError> {
        let rows: Vec<ListingIdOnly> = self
            .get_client()?
            .fluent()
            .select()
            .fields(["listing_id"])
            .from(collections::LISTINGS)
            .filter(move |q| q.field("user_id").eq(user_id))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        Ok(rows.into_iter().map(|r| r.listing_id).collect())
    }

    async fn insert_new_listings(&self, listings: &[Listing]) -> Result<Vec<Listing>, AppError> {
        if listings.is_empty() {
            return Ok(Vec::new());
        }

        // Each chunk is its own transaction. The create precondition fails a
        // chunk when one of its rows appeared since the caller's lookup, so
        // that chunk alone is re-filtered and retried once; chunks that
        // already committed stay in the result.
        let mut inserted = Vec::with_capacity(listings.len());
        for chunk in listings.chunks(BATCH_SIZE) {
            match self.create_listings(chunk).await {
                Ok(()) => inserted.extend_from_slice(chunk),
                Err(e) => {
                    tracing::warn!(
                        committed = inserted.len(),
                        chunk = chunk.len(),
                        error = %e,
                        "Listing insert conflicted, re-checking existing IDs"
                    );
                    let remaining = self.without_existing(chunk).await?;
                    if !remaining.is_empty() {
                        self.create_listings(&remaining).await?;
                    }
                    inserted.extend(remaining);
                }
            }
        }

        Ok(inserted)
    }

    async fn undelivered_listings(&self, user_id: i64) -> Result<Vec<Listing>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LISTINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("delivered").eq(false),
                ])
            })
            .order_by([("published_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn mark_delivered(
        &self,
        user_id: i64,
        listing_ids: &[String],
    ) -> Result<usize, AppError> {
        self.patch_existing(
            user_id,
            listing_ids,
            "delivered",
            &DeliveredPatch { delivered: true },
        )
        .await
    }

    async fn listings_for_user(
        &self,
        user_id: i64,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, AppError> {
        self.query_listings(user_id, status, FirestoreQueryDirection::Descending)
            .await
    }

    async fn update_status(
        &self,
        user_id: i64,
        listing_ids: &[String],
        status: ListingStatus,
    ) -> Result<usize, AppError> {
        self.patch_existing(user_id, listing_ids, "status", &StatusPatch { status })
            .await
    }

    async fn delete_listing(&self, user_id: i64, listing_id: &str) -> Result<bool, AppError> {
        let doc_id = Listing::document_id_for(user_id, listing_id);
        let existing: Option<Listing> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LISTINGS)
            .obj()
            .one(&doc_id)
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        if existing.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::LISTINGS)
            .document_id(&doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(true)
    }

    async fn delete_all_listings(&self, user_id: i64) -> Result<usize, AppError> {
        let ids: Vec<String> = self.listing_ids_for_user(user_id).await?.into_iter().collect();

        self.write_in_transactions(&ids, |client, id, tx| {
            client
                .fluent()
                .delete()
                .from(collections::LISTINGS)
                .document_id(Listing::document_id_for(user_id, id))
                .add_to_transaction(tx)
                .map_err(|e| AppError::Persistence(format!("Failed to stage delete: {}", e)))?;
            Ok(())
        })
        .await?;

        tracing::debug!(user_id, count = ids.len(), "Deleted listings");
        Ok(ids.len())
    }

    async fn count_new(&self, user_id: i64) -> Result<u64, AppError> {
        let rows: Vec<ListingIdOnly> = self
            .get_client()?
            .fluent()
            .select()
            .fields(["listing_id"])
            .from(collections::LISTINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("status").eq(ListingStatus::New.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;

        Ok(rows.len() as u64)
    }

    // ─── Preference Operations ───────────────────────────────────

    async fn get_preferences(&self, user_id: i64) -> Result<Option<UserPreferences>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PREFERENCES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }

    async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PREFERENCES)
            .document_id(prefs.user_id.to_string())
            .object(prefs)
            .execute()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn auto_update_candidates(&self) -> Result<Vec<UserPreferences>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PREFERENCES)
            .filter(|q| q.field("auto_update_enabled").eq(true))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Persistence(e.to_string()))
    }
}
