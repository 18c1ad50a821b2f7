// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and offline development.
//!
//! Implements the same conditional-write and create-only semantics as the
//! Firestore store; each row map's shard lock makes the compare-and-swap
//! atomic per exercise.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::db::{LedgerInsert, SessionQueryCursor, Store};
use crate::error::{AppError, Result};
use crate::models::session::SessionStatus;
use crate::models::{ActionLogEntry, Exercise, Session, Workout};

#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    workouts: DashMap<String, Workout>,
    exercises: DashMap<String, Exercise>,
    action_log: DashMap<String, ActionLogEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, for rollback assertions in tests.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn list_finished_sessions(
        &self,
        user_id: &str,
        cursor: Option<&SessionQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Session>> {
        let mut finished: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| {
                let s = entry.value();
                s.user_id == user_id
                    && s.completed_at.is_some()
                    && matches!(s.status, SessionStatus::Completed | SessionStatus::Stopped)
            })
            .map(|entry| entry.value().clone())
            .collect();

        finished.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(cursor) = cursor {
            finished.retain(|s| match s.completed_at {
                Some(completed) => {
                    completed < cursor.completed_at
                        || (completed == cursor.completed_at && s.id < cursor.session_id)
                }
                None => false,
            });
        }

        finished.truncate(limit as usize);
        Ok(finished)
    }

    async fn insert_workout(&self, workout: &Workout) -> Result<()> {
        self.workouts.insert(workout.id.clone(), workout.clone());
        Ok(())
    }

    async fn get_workout_for_session(&self, session_id: &str) -> Result<Option<Workout>> {
        Ok(self
            .workouts
            .iter()
            .find(|entry| entry.value().session_id == session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<()> {
        self.workouts.remove(workout_id);
        Ok(())
    }

    async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<()> {
        for exercise in exercises {
            self.exercises.insert(exercise.id.clone(), exercise.clone());
        }
        Ok(())
    }

    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>> {
        Ok(self.exercises.get(exercise_id).map(|e| e.clone()))
    }

    async fn list_exercises(&self, workout_id: &str) -> Result<Vec<Exercise>> {
        let mut exercises: Vec<Exercise> = self
            .exercises
            .iter()
            .filter(|entry| entry.value().workout_id == workout_id)
            .map(|entry| entry.value().clone())
            .collect();
        exercises.sort_by_key(|e| e.order_index);
        Ok(exercises)
    }

    async fn delete_exercises_for_workout(&self, workout_id: &str) -> Result<()> {
        self.exercises
            .retain(|_, exercise| exercise.workout_id != workout_id);
        Ok(())
    }

    async fn update_exercise_guarded(
        &self,
        exercise: &Exercise,
        expected_version: u32,
    ) -> Result<()> {
        // The dashmap entry holds the shard lock for the row, making the
        // compare-and-swap atomic.
        match self.exercises.entry(exercise.id.clone()) {
            dashmap::mapref::entry::Entry::Vacant(_) => Err(AppError::NotFound(format!(
                "Exercise {} not found",
                exercise.id
            ))),
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let current = occupied.get().payload_version;
                if current != expected_version {
                    return Err(AppError::VersionConflict {
                        current_version: current,
                    });
                }
                occupied.insert(exercise.clone());
                Ok(())
            }
        }
    }

    async fn finalize_session(&self, session: &Session, workout: &Workout) -> Result<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        self.workouts.insert(workout.id.clone(), workout.clone());
        Ok(())
    }

    async fn get_action_log(&self, command_id: &str) -> Result<Option<ActionLogEntry>> {
        Ok(self.action_log.get(command_id).map(|e| e.clone()))
    }

    async fn insert_action_log(&self, entry: &ActionLogEntry) -> Result<LedgerInsert> {
        match self.action_log.entry(entry.command_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                Ok(LedgerInsert::AlreadyApplied(existing.get().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry.clone());
                Ok(LedgerInsert::Inserted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exercise::ExerciseStatus;

    fn exercise(id: &str, version: u32) -> Exercise {
        Exercise {
            id: id.to_string(),
            workout_id: "w1".to_string(),
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            order_index: 0,
            status: ExerciseStatus::Pending,
            payload: serde_json::json!({}),
            payload_version: version,
            name: "Squat".to_string(),
            exercise_rpe: None,
            total_reps: 0,
            volume: 0.0,
            duration_sec: 0,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_guarded_update_rejects_stale_version() {
        let store = MemoryStore::new();
        store.insert_exercises(&[exercise("e1", 1)]).await.unwrap();

        store
            .update_exercise_guarded(&exercise("e1", 2), 1)
            .await
            .unwrap();

        let err = store
            .update_exercise_guarded(&exercise("e1", 2), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::VersionConflict { current_version: 2 }
        ));
    }

    #[tokio::test]
    async fn test_action_log_insert_is_create_only() {
        let store = MemoryStore::new();
        let entry = ActionLogEntry {
            command_id: "c1".to_string(),
            exercise_id: "e1".to_string(),
            resulting_version: 2,
            resulting_status: ExerciseStatus::InProgress,
            resulting_payload: serde_json::json!({}),
            command: crate::models::Command::UnskipExercise,
            client_metadata: None,
            applied_at: chrono::Utc::now(),
        };

        assert!(matches!(
            store.insert_action_log(&entry).await.unwrap(),
            LedgerInsert::Inserted
        ));

        let mut second = entry.clone();
        second.resulting_version = 99;
        match store.insert_action_log(&second).await.unwrap() {
            LedgerInsert::AlreadyApplied(existing) => {
                // First writer wins
                assert_eq!(existing.resulting_version, 2);
            }
            LedgerInsert::Inserted => panic!("duplicate insert must not win"),
        }
    }
}
