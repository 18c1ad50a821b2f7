// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise row model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exercise status state machine: `pending → in_progress → completed`,
/// with `skipped` reachable from any state and reversible only by an
/// explicit unskip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

/// Metrics aggregated from performance sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseMetrics {
    /// Sum of actual reps across sets.
    pub total_reps: u32,
    /// Sum over sets of actual reps × actual load.
    pub volume: f64,
    /// Sum of actual durations.
    pub duration_sec: u32,
    /// Explicit exercise-level RPE, else the integer average of per-set
    /// RPEs; absent when neither exists.
    pub exercise_rpe: Option<u8>,
}

/// Stored exercise row.
///
/// `payload` is kept as raw JSON and migrated to the current schema on
/// read; `payload_version` is the optimistic-concurrency token, bumped by
/// exactly 1 on every successful command application. The remaining fields
/// are denormalized from the payload for cheap querying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    /// Exercise ID (also used as document ID)
    pub id: String,
    pub workout_id: String,
    pub session_id: String,
    /// Owner, denormalized for ownership checks without a join
    pub user_id: String,
    /// Position within the workout
    pub order_index: u32,
    pub status: ExerciseStatus,
    /// Versioned payload document (see `models::payload`)
    pub payload: serde_json::Value,
    /// Compare-and-swap token; starts at 1 on creation
    pub payload_version: u32,

    // Denormalized fields cached alongside the payload
    pub name: String,
    pub exercise_rpe: Option<u8>,
    pub total_reps: u32,
    pub volume: f64,
    pub duration_sec: u32,
    /// When the exercise was last marked completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Exercise {
    /// True when the exercise no longer needs attention in this session.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            ExerciseStatus::Completed | ExerciseStatus::Skipped
        )
    }
}
