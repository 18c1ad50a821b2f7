// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and workout models for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Stopped,
    Canceled,
}

/// How much guidance the user asked for during the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachMode {
    #[default]
    Guided,
    SelfDirected,
}

/// Deterministic finalization summary, computed from the exercise rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub exercises_completed: u32,
    pub exercises_skipped: u32,
    /// Sets with a recorded completion timestamp across all exercises.
    pub total_completed_sets: u32,
    /// Standout completed exercises, for the wrap-up screen.
    pub wins: Vec<String>,
    pub next_session_focus: String,
}

/// One workout attempt by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (also used as document ID)
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub coach_mode: CoachMode,
    pub started_at: DateTime<Utc>,
    /// Set at finalization (for both completed and stopped sessions)
    pub completed_at: Option<DateTime<Utc>>,
    /// Arbitrary references: linked plan, calendar entry, stop reason
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Session-level RPE from the finalization reflection
    pub session_rpe: Option<u8>,
    /// Free-text reflection notes
    pub notes: Option<String>,
    pub summary: Option<SessionSummary>,
}

/// One generated plan instance, belonging to exactly one session.
///
/// Immutable once created except for `actual_duration_min`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    /// Workout ID (also used as document ID)
    pub id: String,
    pub session_id: String,
    pub title: String,
    /// Category/type tag from the generator (e.g. "strength")
    pub category: String,
    pub planned_duration_min: u32,
    /// Set at finalization
    pub actual_duration_min: Option<u32>,
    /// Focus areas carried from the generator output
    #[serde(default)]
    pub focus: Vec<String>,
}
