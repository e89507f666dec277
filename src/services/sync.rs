// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schedule synchronizer.
//!
//! Keeps the on-device mirror of a user's activities in step with the remote
//! source:
//! 1. Evict the mirror when the signed-in user changed
//! 2. Serve the cached list while the last refresh is recent
//! 3. Otherwise fetch only activities stamped after the stored cursor
//! 4. Merge by id, drop soft-removed entries, advance the cursor, persist
//!
//! Nothing here returns an error: remote failures keep the cached list and
//! storage failures degrade to an empty cache, both logged.

use crate::db::ActivitySource;
use crate::models::{Activity, User};
use crate::session::Session;
use crate::store::{keys, LocalStore};
use crate::time_utils::{system_clock, Clock};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Reconciles the local schedule mirror with the remote activity source.
pub struct ScheduleSynchronizer {
    store: Arc<dyn LocalStore>,
    source: Arc<dyn ActivitySource>,
    refresh_interval: chrono::Duration,
    clock: Clock,
    /// Serializes reconciliation and write-through updates on this device.
    lock: Mutex<()>,
    /// Bumped on sign-out and invalidation; in-flight work that sees a
    /// different value must not persist.
    epoch: AtomicU64,
}

impl ScheduleSynchronizer {
    pub fn new(
        store: Arc<dyn LocalStore>,
        source: Arc<dyn ActivitySource>,
        refresh_interval: std::time::Duration,
    ) -> Self {
        Self {
            store,
            source,
            refresh_interval: chrono::Duration::from_std(refresh_interval)
                .unwrap_or(chrono::Duration::MAX),
            clock: system_clock(),
            lock: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reconcile for whatever the session currently holds.
    ///
    /// A loading or signed-out session yields an empty list and touches nothing.
    pub async fn reconcile_session(&self, session: &Session) -> Vec<Activity> {
        match session {
            Session::SignedIn(user) => self.reconcile(user).await,
            Session::Loading => {
                tracing::debug!("Session still loading, skipping reconcile");
                Vec::new()
            }
            Session::SignedOut => Vec::new(),
        }
    }

    /// Produce the current user's up-to-date schedule.
    pub async fn reconcile(&self, user: &User) -> Vec<Activity> {
        if !user.has_uid() {
            tracing::warn!("Reconcile requested without a user id");
            return Vec::new();
        }
        let uid = user.uid.as_str();

        let _guard = self.lock.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        self.check_identity(uid).await;
        let baseline = self.load_schedule(uid).await;

        let now = (self.clock)();
        if let Some(last_fetch) = self.load_last_fetch(uid).await {
            let elapsed = now - last_fetch;
            if elapsed >= chrono::Duration::zero() && elapsed < self.refresh_interval {
                tracing::debug!(
                    uid,
                    cached = baseline.len(),
                    elapsed_secs = elapsed.num_seconds(),
                    "Schedule refresh throttled"
                );
                return baseline;
            }
        }

        let cursor = self.load_cursor(uid).await;
        let fetched = match self.source.fetch_since(uid, cursor).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(uid, error = %e, "Remote schedule refresh failed, keeping cache");
                return baseline;
            }
        };

        let fetched_count = fetched.len();
        let new_cursor = advance_cursor(cursor, max_created(&fetched));
        let mut merged = merge_activities(baseline, fetched);
        merged.retain(|a| a.owner_id == uid);

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::warn!(uid, "Session changed during reconcile, discarding writes");
            return merged;
        }

        // The cursor must never get ahead of the persisted list.
        if !self.save_schedule(uid, &merged).await {
            tracing::warn!(uid, "Failed to persist schedule, dropping local mirror");
            self.clear_user(uid).await;
            return merged;
        }
        // Whole milliseconds, rounded down: a sub-millisecond server stamp at
        // the boundary is fetched again rather than skipped.
        if let Some(cursor) = new_cursor {
            self.write_key(
                &keys::most_recent_created(uid),
                &cursor.timestamp_millis().to_string(),
            )
            .await;
        }
        self.write_key(&keys::last_fetch(uid), &now.timestamp().to_string())
            .await;

        tracing::info!(
            uid,
            fetched = fetched_count,
            total = merged.len(),
            "Schedule reconciled"
        );
        merged
    }

    /// Drop every cached entry tied to the previous owner and to `user`, and
    /// make `user` the owner of the mirror.
    pub async fn invalidate_for_user(&self, user: &User) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if !user.has_uid() {
            tracing::warn!("Invalidation requested without a user id");
            return;
        }

        let _guard = self.lock.lock().await;
        let previous = self.read_key(keys::LAST_OWNER).await;
        if let Some(previous) = previous.filter(|p| p != &user.uid) {
            self.clear_user(&previous).await;
        }
        self.clear_user(&user.uid).await;
        self.write_key(keys::LAST_OWNER, &user.uid).await;

        tracing::info!(uid = %user.uid, "Local schedule invalidated");
    }

    /// Abandon any in-flight reconcile. Cached data stays for the next sign-in.
    pub fn sign_out(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Session ended");
    }

    // ─── Write-through helpers ───────────────────────────────────

    /// Mirror a freshly created activity.
    pub async fn record_created(&self, user: &User, activity: Activity) {
        self.write_through(user, move |schedule| upsert(schedule, activity))
            .await;
    }

    /// Mirror an updated activity.
    pub async fn record_updated(&self, user: &User, activity: Activity) {
        self.write_through(user, move |schedule| upsert(schedule, activity))
            .await;
    }

    /// Drop a deleted (or soft-removed) activity from the mirror.
    pub async fn record_deleted(&self, user: &User, activity_id: &str) {
        self.write_through(user, |schedule| schedule.retain(|a| a.id != activity_id))
            .await;
    }

    async fn write_through<F>(&self, user: &User, apply: F)
    where
        F: FnOnce(&mut Vec<Activity>),
    {
        let uid = user.uid.as_str();
        let _guard = self.lock.lock().await;

        // Only touch the mirror if it belongs to this user.
        if self.read_key(keys::LAST_OWNER).await.as_deref() != Some(uid) {
            tracing::debug!(uid, "Mirror owned by another user, skipping write-through");
            return;
        }

        let mut schedule = self.load_schedule(uid).await;
        apply(&mut schedule);
        schedule.retain(|a| !a.removed);

        if !self.save_schedule(uid, &schedule).await {
            // Next reconcile rebuilds the mirror from the remote source.
            tracing::warn!(uid, "Write-through failed, dropping local schedule");
            self.clear_user(uid).await;
        }
    }

    // ─── Storage helpers ─────────────────────────────────────────

    async fn check_identity(&self, uid: &str) {
        match self.read_key(keys::LAST_OWNER).await {
            Some(previous) if previous == uid => {}
            Some(previous) => {
                tracing::info!(
                    previous_owner = %previous,
                    uid,
                    "Signed-in user changed, clearing local schedule"
                );
                self.clear_user(&previous).await;
                self.clear_user(uid).await;
                self.write_key(keys::LAST_OWNER, uid).await;
            }
            None => {
                self.write_key(keys::LAST_OWNER, uid).await;
            }
        }
    }

    async fn clear_user(&self, uid: &str) {
        for key in keys::user_scoped(uid) {
            if let Err(e) = self.store.remove(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to clear local key");
            }
        }
    }

    async fn read_key(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Local store read failed");
                None
            }
        }
    }

    async fn write_key(&self, key: &str, value: &str) -> bool {
        match self.store.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Local store write failed");
                false
            }
        }
    }

    async fn load_schedule(&self, uid: &str) -> Vec<Activity> {
        let Some(raw) = self.read_key(&keys::schedule(uid)).await else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(uid, error = %e, "Cached schedule is corrupt, ignoring");
            Vec::new()
        })
    }

    async fn save_schedule(&self, uid: &str, schedule: &[Activity]) -> bool {
        match serde_json::to_string(schedule) {
            Ok(raw) => self.write_key(&keys::schedule(uid), &raw).await,
            Err(e) => {
                tracing::warn!(uid, error = %e, "Failed to serialize schedule");
                false
            }
        }
    }

    async fn load_last_fetch(&self, uid: &str) -> Option<DateTime<Utc>> {
        let raw = self.read_key(&keys::last_fetch(uid)).await?;
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    async fn load_cursor(&self, uid: &str) -> Option<DateTime<Utc>> {
        let raw = self.read_key(&keys::most_recent_created(uid)).await?;
        raw.trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Replace entries with the same id in place and append the rest, then drop
/// soft-removed entries.
pub fn merge_activities(baseline: Vec<Activity>, fetched: Vec<Activity>) -> Vec<Activity> {
    let mut merged = baseline;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.clone(), i))
        .collect();

    for record in fetched {
        match index.get(&record.id) {
            Some(&i) => merged[i] = record,
            None => {
                index.insert(record.id.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    merged.retain(|a| !a.removed);
    merged
}

/// Highest `created` watermark in a batch.
pub fn max_created(batch: &[Activity]) -> Option<DateTime<Utc>> {
    batch.iter().map(|a| a.created).max()
}

/// The cursor only moves forward.
fn advance_cursor(
    current: Option<DateTime<Utc>>,
    batch_max: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, batch_max) {
        (Some(current), Some(batch_max)) => Some(current.max(batch_max)),
        (current, batch_max) => batch_max.or(current),
    }
}

fn upsert(schedule: &mut Vec<Activity>, activity: Activity) {
    match schedule.iter_mut().find(|a| a.id == activity.id) {
        Some(slot) => *slot = activity,
        None => schedule.push(activity),
    }
}
