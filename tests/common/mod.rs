// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kanto_kittens::config::Config;
use kanto_kittens::db::{ActivitySource, FirestoreDb};
use kanto_kittens::error::AppError;
use kanto_kittens::models::{Activity, ActivityDraft, MeetingTarget, User, ValidDraft};
use kanto_kittens::routes::create_router;
use kanto_kittens::services::{BookingService, ConfirmationMailer, ScheduleSynchronizer};
use kanto_kittens::store::{LocalStore, MemoryStore, StoreError};
use kanto_kittens::time_utils::Clock;
use kanto_kittens::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Fixed start instant shared by the tests (2027-01-15T08:00:00Z).
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_800_000_000, 0).unwrap()
}

/// Millisecond instant helper.
#[allow(dead_code)]
pub fn ms(value: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value).unwrap()
}

// ─── Clock ───────────────────────────────────────────────────

/// Manually advanced clock.
#[allow(dead_code)]
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

#[allow(dead_code)]
impl TestClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }
}

// ─── Remote source fake ──────────────────────────────────────

/// In-memory activity source with query counting and failure injection.
#[allow(dead_code)]
pub struct FakeSource {
    docs: Mutex<Vec<Activity>>,
    clock: TestClock,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    next_id: AtomicUsize,
    fail_fetch: AtomicBool,
    /// Held by a test to park `fetch_since` after it was counted.
    pub fetch_gate: tokio::sync::Mutex<()>,
}

#[allow(dead_code)]
impl FakeSource {
    pub fn new(clock: TestClock) -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
            clock,
            fetches: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            fail_fetch: AtomicBool::new(false),
            fetch_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Insert or replace a document exactly as given.
    pub fn put(&self, activity: Activity) {
        let mut docs = self.docs.lock().unwrap();
        match docs.iter_mut().find(|a| a.id == activity.id) {
            Some(slot) => *slot = activity,
            None => docs.push(activity),
        }
    }

    pub fn doc(&self, id: &str) -> Option<Activity> {
        self.docs.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Watermarks must stay unique per document write.
    fn stamp(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        let docs = self.docs.lock().unwrap();
        let latest = docs.iter().map(|a| a.created).max();
        match latest {
            Some(latest) if latest >= now => latest + Duration::milliseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn fetch_since(
        &self,
        owner_id: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>, AppError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let _gate = self.fetch_gate.lock().await;

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::Database("unavailable".to_string()));
        }

        let mut matching: Vec<Activity> = self
            .docs
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.owner_id == owner_id && after.map_or(true, |c| a.created > c))
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.created);
        Ok(matching)
    }

    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError> {
        Ok(self.doc(id))
    }

    async fn add(&self, owner_id: &str, draft: ValidDraft) -> Result<Activity, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let id = format!("act-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let activity = draft.into_activity(id, owner_id.to_string(), self.stamp());
        self.put(activity.clone());
        Ok(activity)
    }

    async fn update(&self, mut activity: Activity) -> Result<Activity, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let stored = self
            .doc(&activity.id)
            .ok_or_else(|| AppError::Database(format!("Activity {} missing", activity.id)))?;
        activity.owner_id = stored.owner_id;
        activity.removed = stored.removed;
        activity.created = self.stamp();
        self.put(activity.clone());
        Ok(activity)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.docs.lock().unwrap().retain(|a| a.id != id);
        Ok(())
    }

    async fn mark_removed(&self, id: &str) -> Result<Activity, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut activity = self
            .doc(id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", id)))?;
        activity.removed = true;
        activity.created = self.stamp();
        self.put(activity.clone());
        Ok(activity)
    }
}

// ─── Local store fakes ───────────────────────────────────────

/// Store whose every operation fails.
#[allow(dead_code)]
pub struct BrokenStore;

#[async_trait]
impl LocalStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }

    async fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk unavailable")))
    }
}

/// Store that can be told to reject writes to the schedule list.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct FlakyScheduleStore {
    pub inner: MemoryStore,
    reject_schedule: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FlakyScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_schedule(&self, reject: bool) {
        self.reject_schedule.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalStore for FlakyScheduleStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.starts_with("schedule_") && self.reject_schedule.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("quota exceeded")));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}

// ─── Fixtures ────────────────────────────────────────────────

#[allow(dead_code)]
pub fn user(uid: &str) -> User {
    User {
        uid: uid.to_string(),
        email: Some(format!("{}@kanto.test", uid)),
        name: format!("Trainer {}", uid),
    }
}

/// A stored activity with a given watermark.
#[allow(dead_code)]
pub fn stored_activity(id: &str, owner: &str, created_ms: i64) -> Activity {
    Activity {
        id: id.to_string(),
        title: format!("Booking {}", id),
        start_time: t0() + Duration::days(30),
        end_time: t0() + Duration::days(30) + Duration::hours(1),
        meeting_targets: vec![],
        send_confirm: false,
        description: String::new(),
        owner_id: owner.to_string(),
        created: ms(created_ms),
        removed: false,
    }
}

/// A valid draft starting `start_in` after `now`.
#[allow(dead_code)]
pub fn draft(now: DateTime<Utc>, start_in: Duration, title: &str) -> ActivityDraft {
    ActivityDraft {
        title: title.to_string(),
        start_time: now + start_in,
        end_time: now + start_in + Duration::hours(1),
        meeting_targets: vec![MeetingTarget::new("Ash", Some("ash@pallet.town"))],
        send_confirm: false,
        description: "Meet at the front desk".to_string(),
    }
}

/// Wiring of synchronizer and booking service over fakes.
#[allow(dead_code)]
pub struct Harness {
    pub clock: TestClock,
    pub source: Arc<FakeSource>,
    pub store: MemoryStore,
    pub sync: Arc<ScheduleSynchronizer>,
    pub bookings: BookingService,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let clock = TestClock::starting_at(t0());
        let source = Arc::new(FakeSource::new(clock.clone()));
        let sync = Arc::new(synchronizer(
            Arc::new(store.clone()),
            source.clone(),
            &clock,
        ));
        let bookings = BookingService::new(source.clone(), sync.clone(), ConfirmationMailer::disabled())
            .with_clock(clock.clock());
        Self {
            clock,
            source,
            store,
            sync,
            bookings,
        }
    }

    /// Router over this harness, with the test signing key.
    pub fn router(&self) -> (axum::Router, Config) {
        let config = Config::test_default();
        let state = Arc::new(AppState {
            config: config.clone(),
            sync: self.sync.clone(),
            bookings: self.bookings.clone(),
        });
        (create_router(state), config)
    }
}

/// Synchronizer with the default ten-minute throttle and a test clock.
#[allow(dead_code)]
pub fn synchronizer(
    store: Arc<dyn LocalStore>,
    source: Arc<FakeSource>,
    clock: &TestClock,
) -> ScheduleSynchronizer {
    ScheduleSynchronizer::new(store, source, std::time::Duration::from_secs(600))
        .with_clock(clock.clock())
}
