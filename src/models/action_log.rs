// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Append-only record of successfully applied commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::command::{ClientMetadata, Command};
use crate::models::exercise::ExerciseStatus;

/// One successfully applied command, keyed uniquely by `command_id`.
///
/// Created once per distinct command identifier and never updated; a
/// replayed submission is answered from this record without touching the
/// exercise row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Client command identifier (also used as document ID)
    pub command_id: String,
    pub exercise_id: String,
    /// Payload version produced by the apply
    pub resulting_version: u32,
    pub resulting_status: ExerciseStatus,
    /// Payload document produced by the apply
    pub resulting_payload: serde_json::Value,
    /// Full command body, for audit
    pub command: Command,
    #[serde(default)]
    pub client_metadata: Option<ClientMetadata>,
    pub applied_at: DateTime<Utc>,
}
