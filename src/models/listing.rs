// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listing model: one job posting as tracked for a specific user.

use crate::time_utils::rfc3339_secs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Review state of a listing. Moves NEW → VIEWED only on explicit user action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    #[default]
    New,
    Viewed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::New => "NEW",
            ListingStatus::Viewed => "VIEWED",
        }
    }
}

/// Listing stored in Firestore.
///
/// Identity is `(listing_id, user_id)`; the document ID encodes both so the
/// store itself rejects a second copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Upstream (hh.ru) listing ID
    pub listing_id: String,
    /// Telegram user ID of the owner
    pub user_id: i64,
    pub title: String,
    pub employer: String,
    pub location: String,
    pub schedule_type: String,
    pub compensation_text: String,
    pub source_url: String,
    #[serde(with = "rfc3339_secs")]
    pub published_at: DateTime<Utc>,
    /// When we first stored it for this user
    #[serde(default, with = "rfc3339_secs::option")]
    pub loaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ListingStatus,
    /// Included in a committed notification batch. Never reverts.
    #[serde(default)]
    pub delivered: bool,
}

impl Listing {
    /// Firestore document ID for this listing.
    pub fn document_id(&self) -> String {
        Self::document_id_for(self.user_id, &self.listing_id)
    }

    pub fn document_id_for(user_id: i64, listing_id: &str) -> String {
        format!("{}_{}", user_id, urlencoding::encode(listing_id))
    }
}

/// Listing supplied by a client through the batch import endpoint.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewListing {
    #[validate(length(min = 1, max = 64))]
    pub listing_id: String,
    #[validate(length(min = 1, max = 512))]
    pub title: String,
    #[serde(default)]
    pub employer: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub schedule_type: Option<String>,
    #[serde(default)]
    pub compensation_text: Option<String>,
    #[serde(default)]
    #[validate(url)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewListing {
    /// Convert into an unsaved listing owned by `user_id`.
    pub fn into_listing(self, user_id: i64, now: DateTime<Utc>) -> Listing {
        Listing {
            listing_id: self.listing_id,
            user_id,
            title: self.title,
            employer: self.employer.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            schedule_type: self.schedule_type.unwrap_or_default(),
            compensation_text: self.compensation_text.unwrap_or_default(),
            source_url: self.source_url.unwrap_or_default(),
            published_at: self.published_at.unwrap_or(now),
            loaded_at: None,
            status: ListingStatus::New,
            delivered: false,
        }
    }
}
