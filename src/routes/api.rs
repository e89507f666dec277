// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the signed-in user.

use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityDraft, User};
use crate::session::Session;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_ACTIVITY_ID_LEN: usize = 128;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/schedule", get(get_schedule))
        .route("/api/activities", post(create_activity))
        .route(
            "/api/activities/{id}",
            put(update_activity).delete(delete_activity),
        )
        .route("/api/activities/{id}/cancel", post(cancel_activity))
        .route("/api/session/sign-out", post(sign_out))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub name: String,
}

/// Get current user profile.
async fn get_me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse {
        uid: user.uid,
        email: user.email,
        name: user.name,
    })
}

/// End the session; in-flight schedule refreshes stop persisting.
async fn sign_out(State(state): State<Arc<AppState>>) -> StatusCode {
    state.sync.sign_out();
    StatusCode::NO_CONTENT
}

// ─── Schedule ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
pub struct ScheduleResponse {
    pub activities: Vec<Activity>,
    pub total: usize,
}

/// Reconciled schedule of the signed-in user.
async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Json<ScheduleResponse> {
    let activities = state
        .sync
        .reconcile_session(&Session::SignedIn(user))
        .await;

    Json(ScheduleResponse {
        total: activities.len(),
        activities,
    })
}

// ─── Activities ──────────────────────────────────────────────

fn validate_activity_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ACTIVITY_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid activity id".to_string()))
    }
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(draft): Json<ActivityDraft>,
) -> Result<(StatusCode, Json<Activity>)> {
    let activity = state.bookings.create(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Json(draft): Json<ActivityDraft>,
) -> Result<Json<Activity>> {
    validate_activity_id(&id)?;
    let activity = state.bookings.update(&user, &id, draft).await?;
    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    validate_activity_id(&id)?;
    state.bookings.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    validate_activity_id(&id)?;
    let activity = state.bookings.cancel(&user, &id).await?;
    Ok(Json(activity))
}
