// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vacancy routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Listing, ListingStatus, NewListing, SearchRequest};
use crate::services::vacancy::{ImportReport, SearchOutcome};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_IMPORT_BATCH: usize = 500;

/// Vacancy routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/vacancies", get(list_listings).delete(delete_all_listings))
        .route("/vacancies/search", post(search))
        .route("/vacancies/batch", post(import_listings))
        .route("/vacancies/mark-multiple-viewed", post(mark_multiple_viewed))
        .route("/vacancies/count/new", get(count_new))
        .route("/vacancies/{id}", axum::routing::delete(delete_listing))
        .route("/vacancies/{id}/mark-viewed", post(mark_viewed))
}

// ─── Search ──────────────────────────────────────────────────

/// Run a search now. Empty request fields fall back to stored preferences.
async fn search(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchOutcome>> {
    let token = state.tokens.get_valid_token(user.user_id).await?;
    let outcome = state
        .vacancies
        .search(user.user_id, &token, &request)
        .await?;
    Ok(Json(outcome))
}

// ─── Listing Management ──────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<ListingStatus>,
}

async fn list_listings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Listing>>> {
    Ok(Json(state.vacancies.list(user.user_id, query.status).await?))
}

async fn import_listings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(listings): Json<Vec<NewListing>>,
) -> Result<Json<ImportReport>> {
    if listings.len() > MAX_IMPORT_BATCH {
        return Err(AppError::BadRequest(format!(
            "at most {} listings per batch",
            MAX_IMPORT_BATCH
        )));
    }
    Ok(Json(state.vacancies.import(user.user_id, listings).await?))
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

async fn mark_viewed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UpdatedResponse>> {
    let updated = state.vacancies.mark_viewed(user.user_id, &[id.clone()]).await?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("Listing {}", id)));
    }
    Ok(Json(UpdatedResponse { updated }))
}

#[derive(Debug, Deserialize)]
pub struct MarkViewedRequest {
    pub listing_ids: Vec<String>,
}

async fn mark_multiple_viewed(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<MarkViewedRequest>,
) -> Result<Json<UpdatedResponse>> {
    let updated = state
        .vacancies
        .mark_viewed(user.user_id, &req.listing_ids)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

async fn delete_listing(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    state.vacancies.delete(user.user_id, &id).await?;
    Ok(Json(DeletedResponse { deleted: 1 }))
}

async fn delete_all_listings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeletedResponse>> {
    let deleted = state.vacancies.delete_all(user.user_id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

async fn count_new(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CountResponse>> {
    let count = state.vacancies.count_new(user.user_id).await?;
    Ok(Json(CountResponse { count }))
}
