// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use workout_tracker::config::Config;
use workout_tracker::db::{MemoryStore, Store};
use workout_tracker::models::payload::{ExerciseKind, ExerciseProposal, LoadUnit};
use workout_tracker::routes::create_router;
use workout_tracker::services::generator::{GeneratedPlan, StaticGenerator, WorkoutGenerator};
use workout_tracker::services::{CommandService, SessionService};
use workout_tracker::AppState;

/// A plan with one reps exercise and one hold exercise.
#[allow(dead_code)]
pub fn default_plan() -> GeneratedPlan {
    GeneratedPlan {
        title: "Full Body Strength".to_string(),
        category: "strength".to_string(),
        estimated_duration_min: Some(45),
        focus: vec!["legs".to_string(), "core".to_string()],
        exercises: vec![
            ExerciseProposal {
                name: "Goblet Squat".to_string(),
                kind: ExerciseKind::Reps,
                sets: Some(3),
                reps: Some(vec![10, 8, 6]),
                loads: Some(vec![16.0]),
                load_unit: Some(LoadUnit::Kg),
                holds_sec: None,
                duration_minutes: None,
                distance_m: None,
                rounds: None,
                work_sec: None,
                rest_sec: Some(90),
            },
            ExerciseProposal {
                name: "Plank".to_string(),
                kind: ExerciseKind::Hold,
                sets: Some(2),
                reps: None,
                loads: None,
                load_unit: None,
                holds_sec: Some(vec![45, 45]),
                duration_minutes: None,
                distance_m: None,
                rounds: None,
                work_sec: None,
                rest_sec: Some(60),
            },
        ],
    }
}

/// Create a test app backed by the in-memory store and a canned generator.
/// Returns the router, the shared state, and the store for assertions.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    create_test_app_with(StaticGenerator::new(default_plan()))
}

/// Create a test app with a specific generator implementation.
#[allow(dead_code)]
pub fn create_test_app_with(
    generator: impl WorkoutGenerator + 'static,
) -> (axum::Router, Arc<AppState>, Arc<MemoryStore>) {
    let config = Config::test_default();
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn Store> = memory.clone();
    let generator: Arc<dyn WorkoutGenerator> = Arc::new(generator);

    let commands = CommandService::new(store.clone());
    let sessions = SessionService::new(store.clone(), generator);

    let state = Arc::new(AppState {
        config,
        store,
        commands,
        sessions,
    });

    (create_router(state.clone()), state, memory)
}

/// Create a JWT accepted by the auth middleware.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    workout_tracker::middleware::auth::create_jwt(user_id, signing_key)
        .expect("Failed to create JWT")
}
