// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity booking model, form input validation and invitee normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::ValidateEmail;

/// Stored activity record in Firestore and in the on-device mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct Activity {
    /// Document ID assigned by the remote source
    pub id: String,
    /// Display title
    pub title: String,
    /// Start instant (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub start_time: DateTime<Utc>,
    /// End instant (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub end_time: DateTime<Utc>,
    /// Invitees, in display order
    #[serde(default)]
    pub meeting_targets: Vec<MeetingTarget>,
    /// Whether invitees get a confirmation mail
    #[serde(default)]
    pub send_confirm: bool,
    #[serde(default)]
    pub description: String,
    /// UID of the creating user
    pub owner_id: String,
    /// Server-assigned watermark, re-stamped on every owner write
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub created: DateTime<Utc>,
    /// Soft-delete marker
    #[serde(default)]
    pub removed: bool,
}

impl Activity {
    /// Whether the booking has not started yet.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start_time >= now
    }

    /// Invitees that can be mailed.
    pub fn mailable_targets(&self) -> impl Iterator<Item = &MeetingTarget> {
        self.meeting_targets
            .iter()
            .filter(|t| t.email.as_deref().is_some_and(|e| !e.is_empty()))
    }
}

/// An invitee of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct MeetingTarget {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Set by the invitee's external confirmation flow, never by this client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
}

impl MeetingTarget {
    pub fn new(name: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            name: name.into(),
            email: email.map(str::to_string),
            confirm: None,
        }
    }
}

/// Form input for creating or editing an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDraft {
    #[serde(default)]
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub meeting_targets: Vec<MeetingTarget>,
    #[serde(default)]
    pub send_confirm: bool,
    #[serde(default)]
    pub description: String,
}

/// A draft that passed validation. Only `ActivityDraft::validate` builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidDraft {
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    meeting_targets: Vec<MeetingTarget>,
    send_confirm: bool,
    description: String,
}

impl ValidDraft {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn meeting_targets(&self) -> &[MeetingTarget] {
        &self.meeting_targets
    }

    pub fn send_confirm(&self) -> bool {
        self.send_confirm
    }

    /// Carry over `confirm` flags already recorded for the same invitee email.
    pub fn keep_confirmations(&mut self, previous: &[MeetingTarget]) {
        for target in &mut self.meeting_targets {
            let Some(email) = target.email.as_deref() else {
                continue;
            };
            target.confirm = previous
                .iter()
                .find(|p| {
                    p.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
                .and_then(|p| p.confirm);
        }
    }

    /// Build the stored record.
    pub fn into_activity(self, id: String, owner_id: String, created: DateTime<Utc>) -> Activity {
        Activity {
            id,
            title: self.title,
            start_time: self.start_time,
            end_time: self.end_time,
            meeting_targets: self.meeting_targets,
            send_confirm: self.send_confirm,
            description: self.description,
            owner_id,
            created,
            removed: false,
        }
    }

    /// Apply the draft onto an existing record, keeping identity and ownership.
    pub fn apply_to(self, activity: &mut Activity) {
        activity.title = self.title;
        activity.start_time = self.start_time;
        activity.end_time = self.end_time;
        activity.meeting_targets = self.meeting_targets;
        activity.send_confirm = self.send_confirm;
        activity.description = self.description;
    }
}

/// A validation message bound to one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All validation failures of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any error is reported for `field`.
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ActivityDraft {
    /// Sanitize, normalize and check the draft against `now`.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidDraft, ValidationErrors> {
        let title = strip_markup(&self.title).trim().to_string();
        let description = strip_markup(&self.description).trim().to_string();
        let targets: Vec<MeetingTarget> = self
            .meeting_targets
            .into_iter()
            .map(|t| MeetingTarget {
                name: strip_markup(&t.name),
                email: t.email,
                confirm: None,
            })
            .collect();
        let meeting_targets = normalize_meeting_targets(targets);

        let mut errors = ValidationErrors::default();

        if title.is_empty() {
            errors.push("title", "Title is required");
        }
        if self.start_time < now {
            errors.push("start_time", "Start time must not be in the past");
        }
        if self.end_time < now {
            errors.push("end_time", "End time must not be in the past");
        }
        if self.start_time >= self.end_time {
            errors.push("end_time", "End time must be after start time");
        }

        for (i, target) in meeting_targets.iter().enumerate() {
            match target.email.as_deref() {
                Some(email) if !email.validate_email() => {
                    errors.push(
                        format!("meeting_targets[{}].email", i),
                        "Email address is not valid",
                    );
                }
                None if self.send_confirm => {
                    errors.push(
                        format!("meeting_targets[{}].email", i),
                        "Email is required to send a confirmation",
                    );
                }
                _ => {}
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidDraft {
            title,
            start_time: self.start_time,
            end_time: self.end_time,
            meeting_targets,
            send_confirm: self.send_confirm,
            description,
        })
    }
}

/// Remove angle-bracket sequences. An unterminated `<` swallows the rest.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match (in_tag, c) {
            (false, '<') => in_tag = true,
            (false, c) => out.push(c),
            (true, '>') => in_tag = false,
            (true, _) => {}
        }
    }
    out
}

/// Trim invitees, drop blank names, and keep only the first entry per email.
///
/// Emails compare case-insensitively. Blank emails become `None` and never
/// collide with each other.
pub fn normalize_meeting_targets(targets: Vec<MeetingTarget>) -> Vec<MeetingTarget> {
    let mut seen: HashSet<String> = HashSet::new();
    targets
        .into_iter()
        .filter_map(|t| {
            let name = t.name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let email = t
                .email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty());
            if let Some(email) = &email {
                if !seen.insert(email.to_ascii_lowercase()) {
                    return None;
                }
            }
            Some(MeetingTarget {
                name,
                email,
                confirm: t.confirm,
            })
        })
        .collect()
}
