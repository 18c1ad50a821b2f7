// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout-Tracker API Server
//!
//! Tracks in-progress workout sessions as client-issued commands applied
//! to versioned exercise records, backed by Firestore.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workout_tracker::{
    config::Config,
    db::{FirestoreStore, Store},
    services::{CommandService, HttpGenerator, SessionService},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Workout-Tracker API");

    // Initialize Firestore-backed store
    let store: Arc<dyn Store> = Arc::new(
        FirestoreStore::new(&config.gcp_project_id)
            .await
            .expect("Failed to connect to Firestore"),
    );

    // Initialize the instance generator client
    let generator = Arc::new(HttpGenerator::new(&config.generator_url));
    tracing::info!(url = %config.generator_url, "Generator client initialized");

    // Build services
    let commands = CommandService::new(store.clone());
    let sessions = SessionService::new(store.clone(), generator);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        commands,
        sessions,
    });

    // Build router
    let app = workout_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workout_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
