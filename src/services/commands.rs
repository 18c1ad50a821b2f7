// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command application service: idempotency ledger + optimistic
//! concurrency control around the pure reducer.
//!
//! Each command is processed synchronously: ledger lookup → row read →
//! version check → reduce → conditional write → ledger insert. The store's
//! uniqueness guarantee on the command identifier is the sole exactly-once
//! mechanism; no in-process locks are used.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

use crate::db::{LedgerInsert, Store};
use crate::error::{AppError, Result};
use crate::models::payload;
use crate::models::{ActionLogEntry, CommandRequest, Exercise, ExerciseStatus};
use crate::services::reducer;

/// Result of one command submission: the state the client should now hold.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub exercise_id: String,
    pub payload_version: u32,
    pub status: ExerciseStatus,
    pub payload: serde_json::Value,
}

impl CommandOutcome {
    fn from_entry(entry: ActionLogEntry) -> Self {
        Self {
            exercise_id: entry.exercise_id,
            payload_version: entry.resulting_version,
            status: entry.resulting_status,
            payload: entry.resulting_payload,
        }
    }
}

/// Applies client commands to exercise rows.
#[derive(Clone)]
pub struct CommandService {
    store: Arc<dyn Store>,
}

impl CommandService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply one command to one exercise.
    ///
    /// A replayed command identifier returns the recorded result without
    /// touching the exercise row; a stale expected version fails with
    /// `VersionConflict` carrying the current version and mutates nothing.
    pub async fn apply(
        &self,
        user_id: &str,
        exercise_id: &str,
        request: CommandRequest,
    ) -> Result<CommandOutcome> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        request.command.validate()?;

        // Ledger lookup: retried/duplicate submissions short-circuit here.
        if let Some(entry) = self.store.get_action_log(&request.command_id).await? {
            if entry.exercise_id != exercise_id {
                return Err(AppError::Validation(format!(
                    "command_id {} was already used for another exercise",
                    request.command_id
                )));
            }
            tracing::debug!(
                command_id = %request.command_id,
                exercise_id,
                "Command replayed from action log"
            );
            return Ok(CommandOutcome::from_entry(entry));
        }

        let exercise = self
            .store
            .get_exercise(exercise_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exercise {} not found", exercise_id)))?;

        if exercise.user_id != user_id {
            return Err(AppError::Forbidden(
                "Exercise does not belong to this user".to_string(),
            ));
        }

        if exercise.payload_version != request.expected_version {
            return Err(AppError::VersionConflict {
                current_version: exercise.payload_version,
            });
        }

        let current = payload::migrate(exercise.payload.clone())?;
        let now = Utc::now();
        let reduced = reducer::apply(&current, exercise.status, &request.command, now)?;

        let next_version = exercise.payload_version + 1;
        let payload_value = serde_json::to_value(&reduced.payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Payload serialization: {}", e)))?;

        let completed_at = if reduced.status == ExerciseStatus::Completed {
            exercise.completed_at.or(Some(now))
        } else {
            None
        };

        let updated = Exercise {
            status: reduced.status,
            payload: payload_value.clone(),
            payload_version: next_version,
            name: reduced.payload.identity.name.clone(),
            exercise_rpe: reduced.metrics.exercise_rpe,
            total_reps: reduced.metrics.total_reps,
            volume: reduced.metrics.volume,
            duration_sec: reduced.metrics.duration_sec,
            completed_at,
            ..exercise
        };

        match self
            .store
            .update_exercise_guarded(&updated, request.expected_version)
            .await
        {
            Ok(()) => {}
            Err(AppError::VersionConflict { current_version }) => {
                // Lost the row to a concurrent writer. If that writer was a
                // duplicate of this very command, its ledger record is the
                // authoritative result; otherwise surface the conflict.
                if let Some(entry) = self.store.get_action_log(&request.command_id).await? {
                    return Ok(CommandOutcome::from_entry(entry));
                }
                return Err(AppError::VersionConflict { current_version });
            }
            Err(e) => return Err(e),
        }

        let entry = ActionLogEntry {
            command_id: request.command_id.clone(),
            exercise_id: exercise_id.to_string(),
            resulting_version: next_version,
            resulting_status: reduced.status,
            resulting_payload: payload_value,
            command: request.command,
            client_metadata: request.client_metadata,
            applied_at: now,
        };

        let outcome = match self.store.insert_action_log(&entry).await? {
            LedgerInsert::Inserted => {
                tracing::info!(
                    command_id = %entry.command_id,
                    exercise_id,
                    version = next_version,
                    status = ?entry.resulting_status,
                    "Command applied"
                );
                CommandOutcome::from_entry(entry)
            }
            // First writer wins on identical identifiers racing.
            LedgerInsert::AlreadyApplied(existing) => CommandOutcome::from_entry(existing),
        };

        Ok(outcome)
    }
}
