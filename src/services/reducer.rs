// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pure command reducer.
//!
//! `apply` maps (payload, status, command) to (next payload, next status,
//! metrics). No I/O, no clock reads (the apply time is a parameter), no
//! store handle; the concurrency controller in `services::commands` owns
//! all of that. Every command kind has a defined transform — the match is
//! exhaustive, so a new command kind is a compile-time-forced change here.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::command::Command;
use crate::models::exercise::{ExerciseMetrics, ExerciseStatus};
use crate::models::payload::{Payload, PerformedSet, SCHEMA_VERSION};

/// Result of one reducer application.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    pub payload: Payload,
    pub status: ExerciseStatus,
    pub metrics: ExerciseMetrics,
}

/// Apply one command to an exercise payload.
///
/// Skip is absolute: once `skipped`, status stays `skipped` regardless of
/// any other command until an explicit `unskip_exercise`.
pub fn apply(
    payload: &Payload,
    status: ExerciseStatus,
    command: &Command,
    now: DateTime<Utc>,
) -> Result<Reduced, AppError> {
    let mut next = payload.clone();

    // `Some(_)` when the command sets status explicitly instead of
    // deriving it from performance.
    let explicit_status = match command {
        Command::CompleteSet {
            set_index,
            reps,
            load,
            duration_sec,
            distance_m,
            rpe,
        } => {
            let set = performed_set_mut(&mut next, *set_index)?;
            merge_actuals(set, *reps, *load, *duration_sec, *distance_m, *rpe);
            set.completed_at = Some(now);
            None
        }
        Command::UpdateSetActual {
            set_index,
            reps,
            load,
            duration_sec,
            distance_m,
            rpe,
        } => {
            let set = performed_set_mut(&mut next, *set_index)?;
            merge_actuals(set, *reps, *load, *duration_sec, *distance_m, *rpe);
            if set.completed_at.is_none() && set.has_effort() {
                set.completed_at = Some(now);
            }
            None
        }
        Command::UpdateSetTarget {
            set_index,
            reps,
            load,
            load_unit,
            duration_sec,
            distance_m,
        } => {
            let set_count = next.prescription.sets.len();
            let target = next
                .prescription
                .sets
                .get_mut(*set_index)
                .ok_or(AppError::InvalidSetIndex {
                    index: *set_index,
                    set_count,
                })?;
            if reps.is_some() {
                target.reps = *reps;
            }
            if load.is_some() {
                target.load = *load;
            }
            if load_unit.is_some() {
                target.load_unit = *load_unit;
            }
            if duration_sec.is_some() {
                target.duration_sec = *duration_sec;
            }
            if distance_m.is_some() {
                target.distance_m = *distance_m;
            }
            next.flags.modified = true;
            None
        }
        Command::SetExerciseRpe { rpe } => {
            next.rpe = Some(*rpe);
            None
        }
        Command::SetExerciseNote { note } => {
            next.note = Some(note.clone());
            None
        }
        Command::SkipExercise { reason } => {
            next.flags.skip_reason = reason.clone();
            Some(ExerciseStatus::Skipped)
        }
        Command::UnskipExercise => {
            next.flags.skip_reason = None;
            Some(derive_status(&next))
        }
        Command::CompleteExercise => {
            for set in &mut next.performance.sets {
                if set.has_effort() && set.completed_at.is_none() {
                    set.completed_at = Some(now);
                }
            }
            Some(ExerciseStatus::Completed)
        }
        Command::ReopenExercise => Some(derive_status(&next)),
        Command::AdjustRestSeconds { rest_sec } => {
            next.prescription.rest_sec = *rest_sec;
            next.flags.modified = true;
            None
        }
    };

    let next_status = match explicit_status {
        Some(s) => s,
        None if status == ExerciseStatus::Skipped => ExerciseStatus::Skipped,
        None => derive_status(&next),
    };

    next.schema_version = SCHEMA_VERSION;
    let metrics = derive_metrics(&next);

    Ok(Reduced {
        payload: next,
        status: next_status,
        metrics,
    })
}

/// Derive status from performance completeness: no effortful sets →
/// `pending`, all → `completed`, otherwise `in_progress`.
///
/// Callers handle the `skipped` short-circuit; this function never
/// returns it.
pub fn derive_status(payload: &Payload) -> ExerciseStatus {
    let total = payload.performance.sets.len();
    let done = payload
        .performance
        .sets
        .iter()
        .filter(|s| s.has_effort())
        .count();

    if done == 0 {
        ExerciseStatus::Pending
    } else if done == total {
        ExerciseStatus::Completed
    } else {
        ExerciseStatus::InProgress
    }
}

/// Aggregate reps/volume/duration/RPE from performance sets, treating
/// null as 0 — except the exercise RPE, which stays absent when no RPE
/// was recorded at all.
pub fn derive_metrics(payload: &Payload) -> ExerciseMetrics {
    let mut total_reps: u32 = 0;
    let mut volume: f64 = 0.0;
    let mut duration_sec: u32 = 0;

    for set in &payload.performance.sets {
        total_reps += set.reps.unwrap_or(0);
        duration_sec += set.duration_sec.unwrap_or(0);
        if let (Some(reps), Some(load)) = (set.reps, set.load) {
            volume += reps as f64 * load;
        }
    }

    let exercise_rpe = payload.rpe.or_else(|| {
        let rpes: Vec<u32> = payload
            .performance
            .sets
            .iter()
            .filter_map(|s| s.rpe.map(u32::from))
            .collect();
        if rpes.is_empty() {
            None
        } else {
            Some((rpes.iter().sum::<u32>() / rpes.len() as u32) as u8)
        }
    });

    ExerciseMetrics {
        total_reps,
        volume,
        duration_sec,
        exercise_rpe,
    }
}

fn performed_set_mut(payload: &mut Payload, index: usize) -> Result<&mut PerformedSet, AppError> {
    let set_count = payload.performance.sets.len();
    payload
        .performance
        .sets
        .get_mut(index)
        .ok_or(AppError::InvalidSetIndex { index, set_count })
}

fn merge_actuals(
    set: &mut PerformedSet,
    reps: Option<u32>,
    load: Option<f64>,
    duration_sec: Option<u32>,
    distance_m: Option<f64>,
    rpe: Option<u8>,
) {
    // Only fields present in the command overwrite; a retried submission
    // converges on the same set state.
    if reps.is_some() {
        set.reps = reps;
    }
    if load.is_some() {
        set.load = load;
    }
    if duration_sec.is_some() {
        set.duration_sec = duration_sec;
    }
    if distance_m.is_some() {
        set.distance_m = distance_m;
    }
    if rpe.is_some() {
        set.rpe = rpe;
    }
}
