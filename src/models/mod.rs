// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod listing;
pub mod preferences;
pub mod user;

pub use listing::{Listing, ListingStatus, NewListing};
pub use preferences::{
    AutoUpdateRequest, PreferencesUpdate, SearchQuery, SearchRequest, UserPreferences,
};
pub use user::{SubscriptionStatus, UserProfile};
