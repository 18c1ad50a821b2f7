// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::SessionQueryCursor;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::payload::Payload;
use crate::models::{CommandRequest, Exercise, ExerciseStatus, Session, SessionSummary, Workout};
use crate::services::session::{CreateSessionRequest, FinalizeRequest};
use crate::services::CommandOutcome;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions", post(create_session).get(get_history))
        .route("/api/sessions/{id}", get(get_session_detail))
        .route("/api/sessions/{id}/finalize", post(finalize_session))
        .route("/api/exercises/{id}/commands", post(submit_command))
}

// ─── Views ───────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionView {
    pub id: String,
    pub status: String,
    pub coach_mode: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub session_rpe: Option<u8>,
    pub notes: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub summary: Option<SessionSummary>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WorkoutView {
    pub id: String,
    pub title: String,
    pub category: String,
    pub planned_duration_min: u32,
    pub actual_duration_min: Option<u32>,
    pub focus: Vec<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ExerciseView {
    pub id: String,
    pub order_index: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub status: ExerciseStatus,
    pub payload_version: u32,
    pub name: String,
    pub exercise_rpe: Option<u8>,
    pub total_reps: u32,
    pub volume: f64,
    pub duration_sec: u32,
    pub completed_at: Option<String>,
    /// Full payload document (current schema)
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub payload: serde_json::Value,
}

/// Generator-shaped view of the workout, kept for clients that still
/// consume the instance format.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InstanceView {
    pub title: String,
    pub estimated_duration_min: u32,
    pub focus: Vec<String>,
    pub exercises: Vec<InstanceExerciseView>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct InstanceExerciseView {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sets: u32,
    pub rest_sec: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionDetailResponse {
    pub session: SessionView,
    pub workout: WorkoutView,
    pub exercises: Vec<ExerciseView>,
    pub instance: InstanceView,
}

fn session_view(session: &Session) -> SessionView {
    SessionView {
        id: session.id.clone(),
        status: status_label(session),
        coach_mode: serde_json::to_value(session.coach_mode)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        started_at: format_utc_rfc3339(session.started_at),
        completed_at: session.completed_at.map(format_utc_rfc3339),
        session_rpe: session.session_rpe,
        notes: session.notes.clone(),
        summary: session.summary.clone(),
    }
}

fn status_label(session: &Session) -> String {
    serde_json::to_value(session.status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn workout_view(workout: &Workout) -> WorkoutView {
    WorkoutView {
        id: workout.id.clone(),
        title: workout.title.clone(),
        category: workout.category.clone(),
        planned_duration_min: workout.planned_duration_min,
        actual_duration_min: workout.actual_duration_min,
        focus: workout.focus.clone(),
    }
}

fn exercise_view(exercise: &Exercise) -> ExerciseView {
    ExerciseView {
        id: exercise.id.clone(),
        order_index: exercise.order_index,
        status: exercise.status,
        payload_version: exercise.payload_version,
        name: exercise.name.clone(),
        exercise_rpe: exercise.exercise_rpe,
        total_reps: exercise.total_reps,
        volume: exercise.volume,
        duration_sec: exercise.duration_sec,
        completed_at: exercise.completed_at.map(format_utc_rfc3339),
        payload: exercise.payload.clone(),
    }
}

fn instance_view(workout: &Workout, exercises: &[Exercise]) -> InstanceView {
    let exercises = exercises
        .iter()
        .map(|exercise| {
            let (kind, sets, rest_sec) = match crate::models::payload::migrate(exercise.payload.clone())
            {
                Ok(payload) => (
                    kind_label(&payload),
                    payload.prescription.sets.len() as u32,
                    payload.prescription.rest_sec,
                ),
                Err(_) => ("reps".to_string(), 0, None),
            };
            InstanceExerciseView {
                name: exercise.name.clone(),
                kind,
                sets,
                rest_sec,
            }
        })
        .collect();

    InstanceView {
        title: workout.title.clone(),
        estimated_duration_min: workout.planned_duration_min,
        focus: workout.focus.clone(),
        exercises,
    }
}

fn kind_label(payload: &Payload) -> String {
    serde_json::to_value(payload.identity.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "reps".to_string())
}

fn detail_response(
    session: &Session,
    workout: &Workout,
    exercises: &[Exercise],
) -> SessionDetailResponse {
    SessionDetailResponse {
        session: session_view(session),
        workout: workout_view(workout),
        exercises: exercises.iter().map(exercise_view).collect(),
        instance: instance_view(workout, exercises),
    }
}

// ─── Session Creation ────────────────────────────────────────

/// Create a session: seed a workout instance from the generator.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionDetailResponse>> {
    tracing::debug!(user_id = %user.user_id, "Creating session");

    let detail = state.sessions.create(&user.user_id, request).await?;

    Ok(Json(detail_response(
        &detail.session,
        &detail.workout,
        &detail.exercises,
    )))
}

/// Get full session detail.
async fn get_session_detail(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailResponse>> {
    let detail = state.sessions.detail(&user.user_id, &session_id).await?;

    Ok(Json(detail_response(
        &detail.session,
        &detail.workout,
        &detail.exercises,
    )))
}

// ─── Finalization ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FinalizeResponse {
    pub session: SessionView,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub summary: SessionSummary,
    pub actual_duration_min: u32,
}

/// Finalize a session (complete or stop).
async fn finalize_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>> {
    let outcome = state
        .sessions
        .finalize(&user.user_id, &session_id, request)
        .await?;

    Ok(Json(FinalizeResponse {
        session: session_view(&outcome.session),
        summary: outcome.summary,
        actual_duration_min: outcome.actual_duration_min,
    }))
}

// ─── Command Submission ──────────────────────────────────────

/// Apply one command to one exercise.
async fn submit_command(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(exercise_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandOutcome>> {
    tracing::debug!(
        user_id = %user.user_id,
        exercise_id = %exercise_id,
        command_id = %request.command_id,
        expected_version = request.expected_version,
        "Submitting command"
    );

    let outcome = state
        .commands
        .apply(&user.user_id, &exercise_id, request)
        .await?;

    Ok(Json(outcome))
}

// ─── History ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    20
}

const MAX_PER_PAGE: u32 = 50;
const CURSOR_PARTS: usize = 3;

fn parse_cursor(cursor: Option<&str>) -> Result<Option<SessionQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || crate::error::AppError::Validation("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.split(':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let session_id = parts[2].to_string();
            if session_id.is_empty() {
                return Err(invalid_cursor());
            }
            let completed_at =
                chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(SessionQueryCursor {
                completed_at,
                session_id,
            })
        })
        .transpose()
}

fn encode_cursor(cursor: SessionQueryCursor) -> String {
    let payload = format!(
        "{}:{}:{}",
        cursor.completed_at.timestamp(),
        cursor.completed_at.timestamp_subsec_nanos(),
        cursor.session_id
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HistoryResponse {
    pub sessions: Vec<SessionHistoryItem>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionHistoryItem {
    pub id: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: String,
    pub session_rpe: Option<u8>,
    pub exercises_completed: u32,
    pub exercises_skipped: u32,
    pub total_completed_sets: u32,
}

/// List finished sessions, newest first, with rollup numbers.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    tracing::debug!(
        user_id = %user.user_id,
        cursor = ?params.cursor,
        per_page = params.per_page,
        "Fetching session history"
    );

    if params.per_page < 1 {
        return Err(crate::error::AppError::Validation(
            "per_page must be greater than 0".to_string(),
        ));
    }

    let limit = params.per_page.min(MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    // Fetch one extra item to determine if another page is available.
    let fetch_limit = limit.saturating_add(1);
    let mut results = state
        .sessions
        .history(&user.user_id, cursor.as_ref(), fetch_limit)
        .await?;

    let has_more = results.len() > limit as usize;
    if has_more {
        results.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        results.last().and_then(|s| {
            s.completed_at.map(|completed_at| {
                encode_cursor(SessionQueryCursor {
                    completed_at,
                    session_id: s.id.clone(),
                })
            })
        })
    } else {
        None
    };

    let sessions: Vec<SessionHistoryItem> = results
        .into_iter()
        .map(|s| {
            let summary = s.summary.clone().unwrap_or_default();
            SessionHistoryItem {
                status: status_label(&s),
                started_at: format_utc_rfc3339(s.started_at),
                completed_at: s.completed_at.map(format_utc_rfc3339).unwrap_or_default(),
                session_rpe: s.session_rpe,
                exercises_completed: summary.exercises_completed,
                exercises_skipped: summary.exercises_skipped,
                total_completed_sets: summary.total_completed_sets,
                id: s.id,
            }
        })
        .collect();

    Ok(Json(HistoryResponse {
        sessions,
        per_page: limit,
        next_cursor,
    }))
}
