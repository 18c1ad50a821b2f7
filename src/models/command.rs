// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client command model: the closed set of mutation intents against one
//! exercise, plus the submission envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::payload::LoadUnit;

const MAX_NOTE_LEN: usize = 2_000;
const MAX_SKIP_REASON_LEN: usize = 500;

/// A client-submitted mutation intent for one exercise.
///
/// Closed and exhaustive: the reducer matches on every variant, so adding
/// a command kind is a compile-time-forced change there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Record actuals for one set and stamp its completion time
    /// unconditionally.
    CompleteSet {
        set_index: usize,
        #[serde(default)]
        reps: Option<u32>,
        #[serde(default)]
        load: Option<f64>,
        #[serde(default)]
        duration_sec: Option<u32>,
        #[serde(default)]
        distance_m: Option<f64>,
        #[serde(default)]
        rpe: Option<u8>,
    },
    /// Record actuals for one set; the completion time is stamped only the
    /// first time any actual field becomes non-null.
    UpdateSetActual {
        set_index: usize,
        #[serde(default)]
        reps: Option<u32>,
        #[serde(default)]
        load: Option<f64>,
        #[serde(default)]
        duration_sec: Option<u32>,
        #[serde(default)]
        distance_m: Option<f64>,
        #[serde(default)]
        rpe: Option<u8>,
    },
    /// Edit one prescription set's targets. Always marks the payload
    /// modified.
    UpdateSetTarget {
        set_index: usize,
        #[serde(default)]
        reps: Option<u32>,
        #[serde(default)]
        load: Option<f64>,
        #[serde(default)]
        load_unit: Option<LoadUnit>,
        #[serde(default)]
        duration_sec: Option<u32>,
        #[serde(default)]
        distance_m: Option<f64>,
    },
    /// Set the exercise-level overall RPE.
    SetExerciseRpe { rpe: u8 },
    /// Set the exercise-level free-text note.
    SetExerciseNote { note: String },
    /// Record a skip reason and force status to `skipped`.
    SkipExercise {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Clear the skip reason and re-derive status from performance.
    UnskipExercise,
    /// Force status to `completed`, stamping completion time on any set
    /// that has performance but no timestamp yet.
    CompleteExercise,
    /// Re-derive status from performance.
    ReopenExercise,
    /// Edit the prescription rest time. Marks the payload modified.
    AdjustRestSeconds {
        #[serde(default)]
        rest_sec: Option<u32>,
    },
}

impl Command {
    /// Field-level validation, rejected before any store access.
    ///
    /// Set-index bounds are checked against the exercise in the reducer,
    /// since the set count is not known here.
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Command::CompleteSet { rpe, .. } | Command::UpdateSetActual { rpe, .. } => {
                validate_rpe(*rpe)
            }
            Command::SetExerciseRpe { rpe } => validate_rpe(Some(*rpe)),
            Command::SetExerciseNote { note } => {
                if note.len() > MAX_NOTE_LEN {
                    return Err(AppError::Validation(format!(
                        "Note exceeds {} characters",
                        MAX_NOTE_LEN
                    )));
                }
                Ok(())
            }
            Command::SkipExercise { reason } => {
                if reason.as_ref().is_some_and(|r| r.len() > MAX_SKIP_REASON_LEN) {
                    return Err(AppError::Validation(format!(
                        "Skip reason exceeds {} characters",
                        MAX_SKIP_REASON_LEN
                    )));
                }
                Ok(())
            }
            Command::UpdateSetTarget { .. }
            | Command::UnskipExercise
            | Command::CompleteExercise
            | Command::ReopenExercise
            | Command::AdjustRestSeconds { .. } => Ok(()),
        }
    }
}

fn validate_rpe(rpe: Option<u8>) -> Result<(), AppError> {
    match rpe {
        Some(v) if !(1..=10).contains(&v) => Err(AppError::Validation(format!(
            "RPE must be between 1 and 10, got {}",
            v
        ))),
        _ => Ok(()),
    }
}

/// Optional client-supplied audit metadata, recorded verbatim in the
/// action log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

/// Command submission envelope.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommandRequest {
    /// Client-generated unique token used to deduplicate retried
    /// submissions.
    #[validate(length(min = 1, max = 128, message = "command_id must be 1-128 characters"))]
    pub command_id: String,
    /// The payload version the client observed when issuing the command.
    #[validate(range(min = 1, message = "expected_version must be at least 1"))]
    pub expected_version: u32,
    pub command: Command,
    #[serde(default)]
    pub client_metadata: Option<ClientMetadata>,
}
