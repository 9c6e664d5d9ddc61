// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth_client;
pub mod dedup;
pub mod notifications;
pub mod preferences;
pub mod scheduler;
pub mod search;
pub mod token_cache;
pub mod vacancy;

pub use auth_client::{AuthApi, AuthServiceClient, IssuedToken, Messenger};
pub use dedup::ListingDeduper;
pub use notifications::{FlushReport, NotificationBatcher};
pub use preferences::PreferencesService;
pub use scheduler::{AutoUpdateScheduler, TickOutcome, TickReport};
pub use search::{HhClient, RawListing, VacancySearch};
pub use token_cache::TokenCache;
pub use vacancy::{SearchOutcome, VacancyService};

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// Run a collaborator call with an upper time bound. A timeout is reported
/// as the error produced by `on_timeout`.
pub async fn bounded<T, F>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce() -> AppError,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
