// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set); otherwise they are skipped.
//!
//! Every test works on a fresh owner id, so runs do not interfere.

use chrono::{DateTime, Duration, Utc};
use kanto_kittens::db::{ActivitySource, FirestoreDb};
use kanto_kittens::error::AppError;
use kanto_kittens::models::ValidDraft;

mod common;
use common::{draft, test_db};

/// Generate a unique owner id for test isolation.
fn unique_owner() -> String {
    format!("owner-{}", uuid::Uuid::new_v4())
}

fn valid_draft(title: &str) -> ValidDraft {
    draft(Utc::now(), Duration::days(1), title)
        .validate(Utc::now())
        .unwrap()
}

#[tokio::test]
async fn test_offline_client_reports_database_error() {
    let db = FirestoreDb::new_mock();

    let result = db.fetch_since("u1", None).await;

    assert!(matches!(result, Err(AppError::Database(_))));
}

#[tokio::test]
async fn test_add_then_get() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();

    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();
    let fetched = db.get(&created.id).await.unwrap();

    assert_eq!(fetched, Some(created.clone()));
    assert_eq!(created.owner_id, owner);
    assert!(!created.removed);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    require_emulator!();

    let db = test_db().await;
    let missing = db.get(&uuid::Uuid::new_v4().to_string()).await.unwrap();

    assert!(missing.is_none());
}

#[tokio::test]
async fn test_fetch_since_filters_by_owner_and_cursor() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let stranger = unique_owner();

    let first = db.add(&owner, valid_draft("First")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = db.add(&owner, valid_draft("Second")).await.unwrap();
    db.add(&stranger, valid_draft("Not mine")).await.unwrap();

    let all = db.fetch_since(&owner, None).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second"]);

    let newer = db.fetch_since(&owner, Some(first.created)).await.unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].id, second.id);

    let none = db.fetch_since(&owner, Some(second.created)).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_update_and_mark_removed_restamp_watermark() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();

    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let mut edited = created.clone();
    edited.title = "Rescheduled".to_string();
    let updated = db.update(edited).await.unwrap();
    assert!(updated.created > created.created);

    let since_create = db.fetch_since(&owner, Some(created.created)).await.unwrap();
    assert_eq!(since_create.len(), 1);
    assert_eq!(since_create[0].title, "Rescheduled");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let removed = db.mark_removed(&created.id).await.unwrap();
    assert!(removed.removed);
    assert!(removed.created > updated.created);

    let since_update = db.fetch_since(&owner, Some(updated.created)).await.unwrap();
    assert_eq!(since_update.len(), 1);
    assert!(since_update[0].removed);
}

#[tokio::test]
async fn test_delete_removes_document() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();

    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();
    db.delete(&created.id).await.unwrap();

    assert!(db.get(&created.id).await.unwrap().is_none());
    assert!(db.fetch_since(&owner, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_removed_missing_is_not_found() {
    require_emulator!();

    let db = test_db().await;
    let result = db.mark_removed(&uuid::Uuid::new_v4().to_string()).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_watermark_comes_from_server_clock() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    // A device with a clock far in the future must not push the watermark there
    let far_future = Utc::now() + Duration::days(365 * 50);
    let mut edited = created.clone();
    edited.title = "Rescheduled".to_string();
    edited.created = far_future;
    let updated = db.update(edited).await.unwrap();

    assert!(updated.created > created.created);
    assert!(updated.created < far_future);

    // A device with a clock far in the past must not hide its write
    let mut edited = updated.clone();
    edited.title = "Rescheduled again".to_string();
    edited.created = DateTime::UNIX_EPOCH;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let again = db.update(edited).await.unwrap();

    let newer = db.fetch_since(&owner, Some(updated.created)).await.unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].title, "Rescheduled again");
    assert_eq!(newer[0].created, again.created);
}

#[tokio::test]
async fn test_update_cannot_revive_or_reassign() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();
    db.mark_removed(&created.id).await.unwrap();

    // A stale copy from another device still says `removed: false`
    let mut stale = created.clone();
    stale.title = "Stale edit".to_string();
    stale.owner_id = unique_owner();
    let stored = db.update(stale).await.unwrap();

    assert!(stored.removed);
    assert_eq!(stored.owner_id, owner);
    assert_eq!(stored.title, "Stale edit");
}

#[tokio::test]
async fn test_mark_removed_keeps_other_fields() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_owner();
    let created = db.add(&owner, valid_draft("Gym battle")).await.unwrap();

    let mut edited = created.clone();
    edited.title = "Edited elsewhere".to_string();
    db.update(edited).await.unwrap();

    let removed = db.mark_removed(&created.id).await.unwrap();

    assert!(removed.removed);
    assert_eq!(removed.title, "Edited elsewhere");
    assert_eq!(removed.start_time, created.start_time);
}
