// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listing de-duplication tests.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use vacancy_tracker::db::{MemoryDb, Store};
use vacancy_tracker::error::AppError;
use vacancy_tracker::models::{Listing, ListingStatus};
use vacancy_tracker::services::ListingDeduper;

const USER: i64 = 777;

fn candidates(ids: impl IntoIterator<Item = u32>) -> Vec<Listing> {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    ids.into_iter()
        .map(|i| Listing {
            listing_id: format!("{}", 90_000 + i),
            user_id: 0,
            title: format!("Backend engineer #{}", i),
            employer: "Acme".to_string(),
            location: "Moscow".to_string(),
            schedule_type: "Remote".to_string(),
            compensation_text: "Not specified".to_string(),
            source_url: format!("https://hh.ru/vacancy/{}", 90_000 + i),
            published_at: base + Duration::minutes(i as i64),
            loaded_at: None,
            // Whatever the caller passes, stored rows start NEW and undelivered.
            status: ListingStatus::Viewed,
            delivered: true,
        })
        .collect()
}

fn deduper(db: &Arc<MemoryDb>) -> ListingDeduper {
    ListingDeduper::new(db.clone(), std::time::Duration::from_secs(5))
}

#[tokio::test]
async fn test_first_search_stores_everything() {
    let db = Arc::new(MemoryDb::new());
    let saved = deduper(&db)
        .filter_and_persist(USER, candidates(0..15))
        .await
        .unwrap();

    assert_eq!(saved.len(), 15);

    let stored = db.listings_for_user(USER, None).await.unwrap();
    assert_eq!(stored.len(), 15);
    for listing in &stored {
        assert_eq!(listing.user_id, USER);
        assert_eq!(listing.status, ListingStatus::New);
        assert!(!listing.delivered);
        assert!(listing.loaded_at.is_some());
    }
}

#[tokio::test]
async fn test_repeat_search_stores_nothing() {
    let db = Arc::new(MemoryDb::new());
    let dedup = deduper(&db);
    dedup
        .filter_and_persist(USER, candidates(0..15))
        .await
        .unwrap();

    let saved = dedup
        .filter_and_persist(USER, candidates(0..15))
        .await
        .unwrap();
    assert!(saved.is_empty());
    assert_eq!(db.listings_for_user(USER, None).await.unwrap().len(), 15);
}

#[tokio::test]
async fn test_overlapping_search_stores_only_unseen() {
    let db = Arc::new(MemoryDb::new());
    let dedup = deduper(&db);
    dedup
        .filter_and_persist(USER, candidates(0..10))
        .await
        .unwrap();

    let saved = dedup
        .filter_and_persist(USER, candidates(5..20))
        .await
        .unwrap();
    let ids: Vec<_> = saved.iter().map(|l| l.listing_id.as_str()).collect();
    assert_eq!(saved.len(), 10);
    assert!(ids.iter().all(|id| id.parse::<u32>().unwrap() >= 90_010));
}

#[tokio::test]
async fn test_duplicates_within_one_batch_collapse() {
    let db = Arc::new(MemoryDb::new());
    let mut batch = candidates(0..3);
    batch.extend(candidates(0..3));

    let saved = deduper(&db).filter_and_persist(USER, batch).await.unwrap();
    assert_eq!(saved.len(), 3);
}

#[tokio::test]
async fn test_same_listing_for_two_users_is_two_rows() {
    let db = Arc::new(MemoryDb::new());
    let dedup = deduper(&db);

    assert_eq!(
        dedup
            .filter_and_persist(1, candidates(0..4))
            .await
            .unwrap()
            .len(),
        4
    );
    assert_eq!(
        dedup
            .filter_and_persist(2, candidates(0..4))
            .await
            .unwrap()
            .len(),
        4
    );
}

#[tokio::test]
async fn test_concurrent_runs_never_store_twice() {
    let db = Arc::new(MemoryDb::new());
    let dedup = Arc::new(deduper(&db));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dedup = dedup.clone();
            tokio::spawn(async move { dedup.filter_and_persist(USER, candidates(0..12)).await })
        })
        .collect();

    let mut total_saved = 0;
    for handle in handles {
        total_saved += handle.await.unwrap().unwrap().len();
    }

    assert_eq!(total_saved, 12);
    assert_eq!(db.listings_for_user(USER, None).await.unwrap().len(), 12);
}

#[tokio::test]
async fn test_lookup_failure_falls_back_to_store_constraint() {
    let db = Arc::new(MemoryDb::new());
    let dedup = deduper(&db);
    dedup
        .filter_and_persist(USER, candidates(0..5))
        .await
        .unwrap();

    db.set_fail_reads(true);
    let saved = dedup
        .filter_and_persist(USER, candidates(0..8))
        .await
        .unwrap();
    assert_eq!(saved.len(), 3);
}

#[tokio::test]
async fn test_insert_failure_is_reported() {
    let db = Arc::new(MemoryDb::new());
    db.set_fail_writes(true);

    let err = deduper(&db)
        .filter_and_persist(USER, candidates(0..5))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));
}

#[tokio::test]
async fn test_empty_input_touches_nothing() {
    let db = Arc::new(MemoryDb::new());
    db.set_fail_reads(true);
    db.set_fail_writes(true);

    let saved = deduper(&db)
        .filter_and_persist(USER, Vec::new())
        .await
        .unwrap();
    assert!(saved.is_empty());
}
