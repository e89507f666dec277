// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kanto Kittens on-device booking service
//!
//! Serves the reconciled schedule and the booking operations to the app
//! shell, backed by Firestore and a local file mirror.

use kanto_kittens::{
    config::Config,
    db::{ActivitySource, FirestoreDb},
    services::{BookingService, ConfirmationMailer, ScheduleSynchronizer},
    store::{FileStore, LocalStore},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Kanto Kittens booking service");

    // Remote activity source
    let db = FirestoreDb::new(&config.gcp_project_id).await?;
    let source: Arc<dyn ActivitySource> = Arc::new(db);

    // On-device mirror
    let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(&config.cache_dir).await?);

    let sync = Arc::new(ScheduleSynchronizer::new(
        store,
        source.clone(),
        Duration::from_secs(config.schedule_refresh_secs),
    ));
    tracing::info!(
        refresh_secs = config.schedule_refresh_secs,
        "Schedule synchronizer initialized"
    );

    let mailer = ConfirmationMailer::new(&config);
    let bookings = BookingService::new(source, sync.clone(), mailer);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        sync,
        bookings,
    });

    // Build router
    let app = kanto_kittens::routes::create_router(state);

    // Start server (loopback only: the app shell runs on the same device)
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kanto_kittens=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
