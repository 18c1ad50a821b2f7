// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle service.
//!
//! Handles the two state-changing workflows around a session:
//! 1. Create: validate parameters, invoke the instance generator, build
//!    one exercise row per proposal, persist session + workout + exercises
//!    (rolling back the partial session on any failure).
//! 2. Finalize: compute a deterministic summary from the exercise rows,
//!    stamp the actual duration, and transition the session state.

use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::db::{SessionQueryCursor, Store};
use crate::error::{AppError, Result};
use crate::models::exercise::ExerciseStatus;
use crate::models::session::{CoachMode, SessionStatus};
use crate::models::{Exercise, Payload, Session, SessionSummary, Workout};
use crate::services::generator::{GeneratorConstraints, GeneratorContext, WorkoutGenerator};
use crate::services::reducer;

const MAX_WINS: usize = 3;

/// Parameters for creating a session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSessionRequest {
    /// What the user wants out of this session (free text)
    #[validate(length(max = 500, message = "intent must be at most 500 characters"))]
    #[serde(default)]
    pub intent: Option<String>,
    #[validate(range(min = 5, max = 240, message = "time_available_min must be 5-240"))]
    #[serde(default)]
    pub time_available_min: Option<u32>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub coach_mode: CoachMode,
    /// Optional link to an external training plan entry
    #[serde(default)]
    pub plan_ref: Option<String>,
    /// Optional link to a calendar entry
    #[serde(default)]
    pub calendar_ref: Option<String>,
}

/// Terminal mode for finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeMode {
    Complete,
    Stop,
}

/// Optional end-of-session reflection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub rpe: Option<u8>,
    #[serde(default)]
    pub pain_notes: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Parameters for finalizing a session.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeRequest {
    pub mode: FinalizeMode,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub reflection: Option<Reflection>,
}

/// Everything a client needs after create or detail fetch.
#[derive(Debug, Clone)]
pub struct SessionDetail {
    pub session: Session,
    pub workout: Workout,
    pub exercises: Vec<Exercise>,
}

/// Result of finalization.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub session: Session,
    pub summary: SessionSummary,
    pub actual_duration_min: u32,
}

/// Creates and finalizes sessions.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    generator: Arc<dyn WorkoutGenerator>,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn WorkoutGenerator>) -> Self {
        Self { store, generator }
    }

    /// Create a session: seed exercises from the generator output.
    ///
    /// The session row is written first; if the generator or any
    /// subsequent write fails, the partial session is deleted rather than
    /// left orphaned.
    pub async fn create(&self, user_id: &str, request: CreateSessionRequest) -> Result<SessionDetail> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let now = Utc::now();
        let mut metadata = HashMap::new();
        if let Some(plan_ref) = &request.plan_ref {
            metadata.insert("plan_ref".to_string(), plan_ref.clone());
        }
        if let Some(calendar_ref) = &request.calendar_ref {
            metadata.insert("calendar_ref".to_string(), calendar_ref.clone());
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: SessionStatus::InProgress,
            coach_mode: request.coach_mode,
            started_at: now,
            completed_at: None,
            metadata,
            session_rpe: None,
            notes: None,
            summary: None,
        };

        self.store.insert_session(&session).await?;

        match self.seed_workout(&session, &request).await {
            Ok((workout, exercises)) => {
                tracing::info!(
                    user_id,
                    session_id = %session.id,
                    exercise_count = exercises.len(),
                    "Session created"
                );
                Ok(SessionDetail {
                    session,
                    workout,
                    exercises,
                })
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    session_id = %session.id,
                    error = %e,
                    "Session creation failed; rolling back"
                );
                if let Err(rollback_err) = self.store.delete_session(&session.id).await {
                    tracing::error!(
                        session_id = %session.id,
                        error = %rollback_err,
                        "Failed to roll back partial session"
                    );
                }
                Err(e)
            }
        }
    }

    /// Generate the plan and persist workout + exercise rows.
    ///
    /// Cleans up its own writes on failure; the caller removes the session.
    async fn seed_workout(
        &self,
        session: &Session,
        request: &CreateSessionRequest,
    ) -> Result<(Workout, Vec<Exercise>)> {
        let context = GeneratorContext {
            user_id: session.user_id.clone(),
            intent: request.intent.clone(),
            coach_mode: session.coach_mode,
        };
        let constraints = GeneratorConstraints {
            time_available_min: request.time_available_min,
            equipment: request.equipment.clone(),
        };

        let plan = self.generator.generate(&context, &constraints).await?;

        let title = if plan.title.trim().is_empty() {
            "Workout".to_string()
        } else {
            plan.title.trim().to_string()
        };

        let workout = Workout {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            title,
            category: plan.category.clone(),
            planned_duration_min: plan
                .estimated_duration_min
                .or(request.time_available_min)
                .unwrap_or(0),
            actual_duration_min: None,
            focus: plan.focus.clone(),
        };

        let exercises: Vec<Exercise> = plan
            .exercises
            .iter()
            .enumerate()
            .map(|(index, proposal)| {
                let payload = Payload::from_proposal(proposal);
                build_exercise_row(session, &workout, index as u32, payload)
            })
            .collect::<Result<_>>()?;

        self.store.insert_workout(&workout).await?;

        if let Err(e) = self.store.insert_exercises(&exercises).await {
            let _ = self.store.delete_exercises_for_workout(&workout.id).await;
            let _ = self.store.delete_workout(&workout.id).await;
            return Err(e);
        }

        Ok((workout, exercises))
    }

    /// Fetch a session with its workout and exercises.
    pub async fn detail(&self, user_id: &str, session_id: &str) -> Result<SessionDetail> {
        let session = self.owned_session(user_id, session_id).await?;

        let workout = self
            .store
            .get_workout_for_session(&session.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout for session {} not found", session_id)))?;

        let exercises = self.store.list_exercises(&workout.id).await?;

        Ok(SessionDetail {
            session,
            workout,
            exercises,
        })
    }

    /// Finalize a session with a terminal mode and optional reflection.
    ///
    /// The summary is computed purely from the current exercise rows; no
    /// generator call is involved in this path.
    pub async fn finalize(
        &self,
        user_id: &str,
        session_id: &str,
        request: FinalizeRequest,
    ) -> Result<FinalizeOutcome> {
        if let Some(reflection) = &request.reflection {
            if reflection.rpe.is_some_and(|rpe| !(1..=10).contains(&rpe)) {
                return Err(AppError::Validation(
                    "Reflection RPE must be between 1 and 10".to_string(),
                ));
            }
        }

        let mut session = self.owned_session(user_id, session_id).await?;

        if session.status != SessionStatus::InProgress {
            return Err(AppError::Validation(format!(
                "Session {} is already finalized",
                session_id
            )));
        }

        let mut workout = self
            .store
            .get_workout_for_session(&session.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workout for session {} not found", session_id)))?;

        let exercises = self.store.list_exercises(&workout.id).await?;
        let summary = summarize(&exercises);

        let now = Utc::now();
        let elapsed = now.signed_duration_since(session.started_at);
        let actual_duration_min = elapsed.num_minutes().max(0) as u32;

        session.status = match request.mode {
            FinalizeMode::Complete => SessionStatus::Completed,
            FinalizeMode::Stop => SessionStatus::Stopped,
        };
        session.completed_at = Some(now);
        session.summary = Some(summary.clone());
        if let Some(stop_reason) = request.stop_reason {
            session
                .metadata
                .insert("stop_reason".to_string(), stop_reason);
        }
        if let Some(reflection) = request.reflection {
            session.session_rpe = reflection.rpe;
            session.notes = reflection.notes;
            if let Some(pain_notes) = reflection.pain_notes {
                session.metadata.insert("pain_notes".to_string(), pain_notes);
            }
        }

        workout.actual_duration_min = Some(actual_duration_min);

        self.store.finalize_session(&session, &workout).await?;

        tracing::info!(
            user_id,
            session_id,
            status = ?session.status,
            completed = summary.exercises_completed,
            skipped = summary.exercises_skipped,
            actual_duration_min,
            "Session finalized"
        );

        Ok(FinalizeOutcome {
            session,
            summary,
            actual_duration_min,
        })
    }

    /// Finished sessions for a user, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        cursor: Option<&SessionQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Session>> {
        self.store.list_finished_sessions(user_id, cursor, limit).await
    }

    async fn owned_session(&self, user_id: &str, session_id: &str) -> Result<Session> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

        if session.user_id != user_id {
            return Err(AppError::Forbidden(
                "Session does not belong to this user".to_string(),
            ));
        }

        Ok(session)
    }
}

fn build_exercise_row(
    session: &Session,
    workout: &Workout,
    order_index: u32,
    payload: Payload,
) -> Result<Exercise> {
    let metrics = reducer::derive_metrics(&payload);
    let name = payload.identity.name.clone();
    let payload_value = serde_json::to_value(&payload)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Payload serialization: {}", e)))?;

    Ok(Exercise {
        id: Uuid::new_v4().to_string(),
        workout_id: workout.id.clone(),
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        order_index,
        status: ExerciseStatus::Pending,
        payload: payload_value,
        payload_version: 1,
        name,
        exercise_rpe: metrics.exercise_rpe,
        total_reps: metrics.total_reps,
        volume: metrics.volume,
        duration_sec: metrics.duration_sec,
        completed_at: None,
    })
}

/// Compute the finalization summary from the exercise rows.
fn summarize(exercises: &[Exercise]) -> SessionSummary {
    let completed: Vec<&Exercise> = exercises
        .iter()
        .filter(|e| e.status == ExerciseStatus::Completed)
        .collect();
    let skipped = exercises
        .iter()
        .filter(|e| e.status == ExerciseStatus::Skipped)
        .count() as u32;

    let total_completed_sets: u32 = exercises
        .iter()
        .map(|e| completed_set_count(e))
        .sum();

    // Highest-volume completed exercises make the wins list
    let mut by_volume: Vec<&Exercise> = completed.clone();
    by_volume.sort_by(|a, b| {
        b.volume
            .partial_cmp(&a.volume)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let wins: Vec<String> = by_volume
        .iter()
        .take(MAX_WINS)
        .map(|e| e.name.clone())
        .collect();

    let unresolved: Vec<&str> = exercises
        .iter()
        .filter(|e| !e.is_resolved())
        .map(|e| e.name.as_str())
        .collect();

    let next_session_focus = if !unresolved.is_empty() {
        format!("Pick up where you left off: {}", unresolved.join(", "))
    } else if skipped > 0 {
        "Revisit what you skipped this time".to_string()
    } else {
        "Keep the streak going".to_string()
    };

    SessionSummary {
        exercises_completed: completed.len() as u32,
        exercises_skipped: skipped,
        total_completed_sets,
        wins,
        next_session_focus,
    }
}

/// Sets with a recorded completion timestamp, read from the payload.
fn completed_set_count(exercise: &Exercise) -> u32 {
    crate::models::payload::migrate(exercise.payload.clone())
        .map(|p| {
            p.performance
                .sets
                .iter()
                .filter(|s| s.completed_at.is_some())
                .count() as u32
        })
        .unwrap_or(0)
}
