// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner-write path for activities.
//!
//! Every mutation goes to the remote source first; the local mirror is only
//! updated once the remote write succeeded.

use crate::db::ActivitySource;
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityDraft, MeetingTarget, User};
use crate::services::{ConfirmationMailer, ScheduleSynchronizer};
use crate::time_utils::{system_clock, Clock};
use std::sync::Arc;

/// Create, edit and delete bookings for the signed-in user.
#[derive(Clone)]
pub struct BookingService {
    source: Arc<dyn ActivitySource>,
    sync: Arc<ScheduleSynchronizer>,
    mailer: ConfirmationMailer,
    clock: Clock,
}

impl BookingService {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        sync: Arc<ScheduleSynchronizer>,
        mailer: ConfirmationMailer,
    ) -> Self {
        Self {
            source,
            sync,
            mailer,
            clock: system_clock(),
        }
    }

    /// Replace the time source used for validation.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and store a new booking.
    pub async fn create(&self, user: &User, draft: ActivityDraft) -> Result<Activity> {
        require_uid(user)?;
        let valid = draft.validate((self.clock)())?;

        let activity = self.source.add(&user.uid, valid).await?;
        self.sync.record_created(user, activity.clone()).await;

        if activity.send_confirm {
            self.mailer
                .send_confirmations(&activity, organizer_name(user), &activity.meeting_targets)
                .await;
        }

        Ok(activity)
    }

    /// Edit a booking that has not started yet.
    pub async fn update(&self, user: &User, id: &str, draft: ActivityDraft) -> Result<Activity> {
        let existing = self.load_owned(user, id).await?;
        let now = (self.clock)();
        if !existing.is_upcoming(now) {
            return Err(AppError::BadRequest(
                "Activity has already started and can no longer be edited".to_string(),
            ));
        }

        let mut valid = draft.validate(now)?;
        valid.keep_confirmations(&existing.meeting_targets);

        let mut updated = existing.clone();
        valid.apply_to(&mut updated);
        let stored = self.source.update(updated).await?;
        self.sync.record_updated(user, stored.clone()).await;

        if stored.send_confirm {
            // Invitees who were already notified are not mailed again.
            let notified: &[MeetingTarget] = if existing.send_confirm {
                &existing.meeting_targets
            } else {
                &[]
            };
            let fresh = new_targets(&stored.meeting_targets, notified);
            if !fresh.is_empty() {
                self.mailer
                    .send_confirmations(&stored, organizer_name(user), &fresh)
                    .await;
            }
        }

        tracing::info!(activity_id = id, uid = %user.uid, "Activity updated");
        Ok(stored)
    }

    /// Permanently delete a booking.
    pub async fn delete(&self, user: &User, id: &str) -> Result<()> {
        self.load_owned(user, id).await?;
        self.source.delete(id).await?;
        self.sync.record_deleted(user, id).await;
        Ok(())
    }

    /// Soft-delete a booking so other devices drop it on their next refresh.
    pub async fn cancel(&self, user: &User, id: &str) -> Result<Activity> {
        self.load_owned(user, id).await?;
        let removed = self.source.mark_removed(id).await?;
        self.sync.record_deleted(user, id).await;
        Ok(removed)
    }

    /// Fetch an activity the user owns. Foreign and removed ones look missing.
    async fn load_owned(&self, user: &User, id: &str) -> Result<Activity> {
        require_uid(user)?;
        match self.source.get(id).await? {
            Some(activity) if activity.owner_id == user.uid && !activity.removed => Ok(activity),
            Some(_) => {
                tracing::warn!(activity_id = id, uid = %user.uid, "Access to foreign or removed activity");
                Err(AppError::NotFound(format!("Activity {}", id)))
            }
            None => Err(AppError::NotFound(format!("Activity {}", id))),
        }
    }
}

fn require_uid(user: &User) -> Result<()> {
    if user.has_uid() {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

fn organizer_name(user: &User) -> &str {
    if !user.name.trim().is_empty() {
        user.name.as_str()
    } else {
        user.email.as_deref().unwrap_or("A Kanto Kittens member")
    }
}

/// Targets whose email was not in `previous`.
fn new_targets(current: &[MeetingTarget], previous: &[MeetingTarget]) -> Vec<MeetingTarget> {
    current
        .iter()
        .filter(|t| {
            let Some(email) = t.email.as_deref() else {
                return false;
            };
            !previous.iter().any(|p| {
                p.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
        })
        .cloned()
        .collect()
}
