// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Kanto Kittens: local-first activity bookings
//!
//! This crate keeps an on-device mirror of a user's bookings in step with a
//! Firestore collection, and provides the validated owner-write path that
//! creates, edits and deletes them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod store;
pub mod time_utils;

use config::Config;
use services::{BookingService, ScheduleSynchronizer};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sync: Arc<ScheduleSynchronizer>,
    pub bookings: BookingService,
}
