// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod user;

pub use activity::{
    normalize_meeting_targets, strip_markup, Activity, ActivityDraft, FieldError, MeetingTarget,
    ValidDraft, ValidationErrors,
};
pub use user::User;
