// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! The core components take a [`Store`] trait object rather than a
//! concrete client, so the command controller and session manager can be
//! exercised against the in-memory implementation while production runs
//! on Firestore.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ActionLogEntry, Exercise, Session, Workout};

/// Collection names as constants.
pub mod collections {
    pub const SESSIONS: &str = "sessions";
    pub const WORKOUTS: &str = "workouts";
    pub const EXERCISES: &str = "exercises";
    /// Applied-command ledger (keyed by command_id)
    pub const ACTION_LOG: &str = "action_log";
}

/// Cursor into the finished-session history listing.
#[derive(Debug, Clone)]
pub struct SessionQueryCursor {
    pub completed_at: DateTime<Utc>,
    pub session_id: String,
}

/// Outcome of a create-only ledger insert.
#[derive(Debug, Clone)]
pub enum LedgerInsert {
    Inserted,
    /// A record with this command_id already exists: first writer won,
    /// and the existing record is the authoritative result.
    AlreadyApplied(ActionLogEntry),
}

/// Access patterns the core requires of the durable store.
///
/// Exercise writes are conditional single-row operations; the action log
/// is append-only with a uniqueness guarantee on the command identifier.
/// No cross-row locking is expected from implementations.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Sessions ────────────────────────────────────────────
    async fn insert_session(&self, session: &Session) -> Result<()>;
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    /// Finished (completed/stopped) sessions for a user, newest first.
    async fn list_finished_sessions(
        &self,
        user_id: &str,
        cursor: Option<&SessionQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Session>>;

    // ─── Workouts ────────────────────────────────────────────
    async fn insert_workout(&self, workout: &Workout) -> Result<()>;
    async fn get_workout_for_session(&self, session_id: &str) -> Result<Option<Workout>>;
    async fn delete_workout(&self, workout_id: &str) -> Result<()>;

    // ─── Exercises ───────────────────────────────────────────
    async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<()>;
    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>>;
    /// Exercises for a workout, ordered by `order_index`.
    async fn list_exercises(&self, workout_id: &str) -> Result<Vec<Exercise>>;
    async fn delete_exercises_for_workout(&self, workout_id: &str) -> Result<()>;

    /// Conditional single-row write: replaces the exercise row only while
    /// the stored `payload_version` still equals `expected_version`, else
    /// fails with `VersionConflict` carrying the current version.
    async fn update_exercise_guarded(
        &self,
        exercise: &Exercise,
        expected_version: u32,
    ) -> Result<()>;

    /// Write session finalization and workout actual duration together.
    async fn finalize_session(&self, session: &Session, workout: &Workout) -> Result<()>;

    // ─── Action log ──────────────────────────────────────────
    async fn get_action_log(&self, command_id: &str) -> Result<Option<ActionLogEntry>>;
    /// Create-only insert keyed by `command_id`; a collision reports the
    /// existing record instead of failing.
    async fn insert_action_log(&self, entry: &ActionLogEntry) -> Result<LedgerInsert>;
}
