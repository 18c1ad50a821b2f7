// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed store with typed operations.
//!
//! Provides the store contract for:
//! - Sessions and workouts (lifecycle + history queries)
//! - Exercises (conditional single-row writes keyed on payload_version)
//! - Action log (create-only inserts keyed by command_id)

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::db::{collections, LedgerInsert, SessionQueryCursor, Store};
use crate::error::{AppError, Result};
use crate::models::{ActionLogEntry, Exercise, Session, Workout};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl Store for FirestoreStore {
    // ─── Session Operations ──────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<()> {
        let _: Session = self
            .client
            .fluent()
            .insert()
            .into(collections::SESSIONS)
            .document_id(&session.id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.client
            .fluent()
            .delete()
            .from(collections::SESSIONS)
            .document_id(session_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Finished sessions for a user, newest first.
    ///
    /// Ordering by `completed_at` omits documents without that field, so
    /// in-progress and canceled sessions never appear here.
    async fn list_finished_sessions(
        &self,
        user_id: &str,
        cursor: Option<&SessionQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Session>> {
        let query = self.client.fluent().select().from(collections::SESSIONS);

        let user_id = user_id.to_string();
        let query = if let Some(cursor) = cursor {
            // Compare in the exact format chrono serializes timestamps with
            let before = cursor
                .completed_at
                .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
            query.filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("completed_at").less_than(before.clone()),
                ])
            })
        } else {
            query.filter(move |q| q.field("user_id").eq(user_id.clone()))
        };

        query
            .order_by([(
                "completed_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Workout Operations ──────────────────────────────────────

    async fn insert_workout(&self, workout: &Workout) -> Result<()> {
        let _: Workout = self
            .client
            .fluent()
            .insert()
            .into(collections::WORKOUTS)
            .document_id(&workout.id)
            .object(workout)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_workout_for_session(&self, session_id: &str) -> Result<Option<Workout>> {
        let session_id = session_id.to_string();
        let workouts: Vec<Workout> = self
            .client
            .fluent()
            .select()
            .from(collections::WORKOUTS)
            .filter(move |q| q.field("session_id").eq(session_id.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(workouts.into_iter().next())
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<()> {
        self.client
            .fluent()
            .delete()
            .from(collections::WORKOUTS)
            .document_id(workout_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Exercise Operations ─────────────────────────────────────

    /// Store exercise rows at session creation.
    ///
    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    async fn insert_exercises(&self, exercises: &[Exercise]) -> Result<()> {
        let client = &self.client;

        stream::iter(exercises.to_vec())
            .map(|exercise| async move {
                let _: Exercise = client
                    .fluent()
                    .insert()
                    .into(collections::EXERCISES)
                    .document_id(&exercise.id)
                    .object(&exercise)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<()>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        Ok(())
    }

    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::EXERCISES)
            .obj()
            .one(exercise_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_exercises(&self, workout_id: &str) -> Result<Vec<Exercise>> {
        let workout_id = workout_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::EXERCISES)
            .filter(move |q| q.field("workout_id").eq(workout_id.clone()))
            .order_by([(
                "order_index",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_exercises_for_workout(&self, workout_id: &str) -> Result<()> {
        let exercises = self.list_exercises(workout_id).await?;
        let client = &self.client;

        stream::iter(exercises)
            .map(|exercise| async move {
                client
                    .fluent()
                    .delete()
                    .from(collections::EXERCISES)
                    .document_id(&exercise.id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<()>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        Ok(())
    }

    // ─── Conditional Exercise Write ──────────────────────────────

    /// Atomically replace an exercise row while its stored payload_version
    /// still equals the expected version.
    ///
    /// Uses a Firestore transaction so the version check and the write
    /// succeed or fail together. A commit lost to a concurrent writer is
    /// re-read and reported as a version conflict with the fresh version.
    async fn update_exercise_guarded(
        &self,
        exercise: &Exercise,
        expected_version: u32,
    ) -> Result<()> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read the current row; this registers it for conflict detection.
        let current: Option<Exercise> = self
            .client
            .fluent()
            .select()
            .by_id_in(collections::EXERCISES)
            .obj()
            .one(&exercise.id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read exercise in transaction: {}", e))
            })?;

        let Some(current) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Exercise {} not found",
                exercise.id
            )));
        };

        if current.payload_version != expected_version {
            let _ = transaction.rollback().await;
            return Err(AppError::VersionConflict {
                current_version: current.payload_version,
            });
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::EXERCISES)
            .document_id(&exercise.id)
            .object(exercise)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add exercise to transaction: {}", e))
            })?;

        if let Err(commit_err) = transaction.commit().await {
            // Lost a race: if the version moved underneath us, surface a
            // conflict with the winner's version rather than a 500.
            let fresh = self.get_exercise(&exercise.id).await?;
            if let Some(fresh) = fresh {
                if fresh.payload_version != expected_version {
                    return Err(AppError::VersionConflict {
                        current_version: fresh.payload_version,
                    });
                }
            }
            return Err(AppError::Database(format!(
                "Transaction commit failed: {}",
                commit_err
            )));
        }

        Ok(())
    }

    // ─── Session Finalization ────────────────────────────────────

    /// Write session status/summary and workout actual duration together.
    async fn finalize_session(&self, session: &Session, workout: &Workout) -> Result<()> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        self.client
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add session to transaction: {}", e))
            })?;

        self.client
            .fluent()
            .update()
            .in_col(collections::WORKOUTS)
            .document_id(&workout.id)
            .object(workout)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add workout to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            session_id = %session.id,
            workout_id = %workout.id,
            "Session finalized atomically"
        );

        Ok(())
    }

    // ─── Action Log Operations ───────────────────────────────────

    async fn get_action_log(&self, command_id: &str) -> Result<Option<ActionLogEntry>> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::ACTION_LOG)
            .obj()
            .one(command_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create-only ledger insert.
    ///
    /// Firestore rejects an insert when the document already exists; the
    /// uniqueness of the document ID is the sole exactly-once mechanism,
    /// so a rejection is read back as "already applied", never an error.
    async fn insert_action_log(&self, entry: &ActionLogEntry) -> Result<LedgerInsert> {
        let inserted: std::result::Result<ActionLogEntry, _> = self
            .client
            .fluent()
            .insert()
            .into(collections::ACTION_LOG)
            .document_id(&entry.command_id)
            .object(entry)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok(LedgerInsert::Inserted),
            Err(insert_err) => match self.get_action_log(&entry.command_id).await? {
                Some(existing) => {
                    tracing::debug!(
                        command_id = %entry.command_id,
                        "Action log insert collided; treating as already applied"
                    );
                    Ok(LedgerInsert::AlreadyApplied(existing))
                }
                None => Err(AppError::Database(insert_err.to_string())),
            },
        }
    }
}
