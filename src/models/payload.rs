// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Versioned exercise payload: the single source of truth for one
//! exercise's prescription, performance, and flags.
//!
//! Payloads are stored as raw JSON and migrated forward on read. Each
//! historical shape is its own typed struct with one explicit upgrade
//! function per version transition; a stored version newer than
//! [`SCHEMA_VERSION`] is never coerced downward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Latest payload schema version understood by this build.
pub const SCHEMA_VERSION: u32 = 2;

/// Upper bound on sets per exercise, applied to generator output.
const MAX_SETS: usize = 20;

/// Exercise type tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    #[default]
    Reps,
    Hold,
    Duration,
    Intervals,
}

/// Unit for prescribed/performed loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadUnit {
    #[default]
    Kg,
    Lb,
}

/// Exercise name + type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub kind: ExerciseKind,
}

/// Targets for one set. All fields nullable; which are filled depends on
/// the exercise kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrescribedSet {
    pub reps: Option<u32>,
    pub load: Option<f64>,
    pub load_unit: Option<LoadUnit>,
    pub duration_sec: Option<u32>,
    pub distance_m: Option<f64>,
}

/// Recorded results for one set, index-aligned with the prescription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformedSet {
    pub reps: Option<u32>,
    pub load: Option<f64>,
    pub duration_sec: Option<u32>,
    pub distance_m: Option<f64>,
    pub rpe: Option<u8>,
    /// Stamped the first time any actual value is recorded.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PerformedSet {
    /// True once any actual value has been recorded for this set.
    pub fn has_effort(&self) -> bool {
        self.reps.is_some()
            || self.load.is_some()
            || self.duration_sec.is_some()
            || self.distance_m.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub sets: Vec<PrescribedSet>,
    pub rest_sec: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub sets: Vec<PerformedSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadFlags {
    pub pain: bool,
    /// Set whenever a target is edited after generation.
    pub modified: bool,
    pub skip_reason: Option<String>,
}

/// The versioned document per exercise.
///
/// Invariant: `performance.sets.len() == prescription.sets.len()`, always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub schema_version: u32,
    pub identity: Identity,
    pub prescription: Prescription,
    pub performance: Performance,
    #[serde(default)]
    pub flags: PayloadFlags,
    /// Exercise-level overall RPE, set explicitly by the client.
    #[serde(default)]
    pub rpe: Option<u8>,
    /// Exercise-level free-text note.
    #[serde(default)]
    pub note: Option<String>,
}

// ─── Migration ───────────────────────────────────────────────

/// Historical shape (version 1): flat identity, one combined array with
/// target and actual fields side by side per set. Predates the explicit
/// `schema_version` field, so a payload without one is read as v1.
#[derive(Debug, Clone, Deserialize)]
struct PayloadV1 {
    name: String,
    kind: ExerciseKind,
    #[serde(default)]
    sets: Vec<SetV1>,
    #[serde(default)]
    rest_sec: Option<u32>,
    #[serde(default)]
    pain: bool,
    #[serde(default)]
    modified: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SetV1 {
    #[serde(default)]
    target_reps: Option<u32>,
    #[serde(default)]
    target_load: Option<f64>,
    #[serde(default)]
    load_unit: Option<LoadUnit>,
    #[serde(default)]
    target_duration_sec: Option<u32>,
    #[serde(default)]
    reps: Option<u32>,
    #[serde(default)]
    load: Option<f64>,
    #[serde(default)]
    duration_sec: Option<u32>,
    #[serde(default)]
    rpe: Option<u8>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

/// Deserialize a stored payload document, upgrading older shapes to the
/// current version.
///
/// Fails with [`AppError::UnsupportedSchemaVersion`] when the stored
/// version is newer than this reader.
pub fn migrate(value: serde_json::Value) -> Result<Payload, AppError> {
    let version = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(1) as u32;

    match version {
        1 => {
            let v1: PayloadV1 = serde_json::from_value(value)
                .map_err(|e| AppError::Database(format!("Malformed v1 payload: {}", e)))?;
            Ok(upgrade_v1(v1))
        }
        SCHEMA_VERSION => serde_json::from_value(value)
            .map_err(|e| AppError::Database(format!("Malformed payload: {}", e))),
        found => Err(AppError::UnsupportedSchemaVersion {
            found,
            supported: SCHEMA_VERSION,
        }),
    }
}

/// Upgrade a v1 payload to the current shape.
///
/// Splits each combined set into a prescription entry and a performance
/// entry; fields v1 never had (distance, skip reason, exercise note) start
/// null. Nothing is dropped.
fn upgrade_v1(v1: PayloadV1) -> Payload {
    let mut prescription_sets = Vec::with_capacity(v1.sets.len());
    let mut performance_sets = Vec::with_capacity(v1.sets.len());

    for set in v1.sets {
        prescription_sets.push(PrescribedSet {
            reps: set.target_reps,
            load: set.target_load,
            load_unit: set.load_unit,
            duration_sec: set.target_duration_sec,
            distance_m: None,
        });
        performance_sets.push(PerformedSet {
            reps: set.reps,
            load: set.load,
            duration_sec: set.duration_sec,
            distance_m: None,
            rpe: set.rpe,
            completed_at: set.completed_at,
        });
    }

    Payload {
        schema_version: SCHEMA_VERSION,
        identity: Identity {
            name: v1.name,
            kind: v1.kind,
        },
        prescription: Prescription {
            sets: prescription_sets,
            rest_sec: v1.rest_sec,
        },
        performance: Performance {
            sets: performance_sets,
        },
        flags: PayloadFlags {
            pain: v1.pain,
            modified: v1.modified,
            skip_reason: None,
        },
        rpe: None,
        note: None,
    }
}

// ─── Construction from generator output ──────────────────────

/// One proposed exercise from the instance generator.
///
/// Untrusted external input: every field is optional and defaulted before
/// it becomes a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseProposal {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ExerciseKind,
    #[serde(default)]
    pub sets: Option<u32>,
    /// Per-set target reps; a short array repeats its last entry.
    #[serde(default)]
    pub reps: Option<Vec<u32>>,
    #[serde(default)]
    pub loads: Option<Vec<f64>>,
    #[serde(default)]
    pub load_unit: Option<LoadUnit>,
    /// Per-set hold durations (hold type).
    #[serde(default)]
    pub holds_sec: Option<Vec<u32>>,
    /// Total duration in minutes (duration type).
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    /// Round count (intervals type).
    #[serde(default)]
    pub rounds: Option<u32>,
    /// Work interval length (intervals type).
    #[serde(default)]
    pub work_sec: Option<u32>,
    #[serde(default)]
    pub rest_sec: Option<u32>,
}

impl Payload {
    /// Build the initial payload for a proposed exercise.
    ///
    /// Set count comes from explicit `sets`, else from the length of
    /// whichever target array is present, else from `rounds` for interval
    /// exercises; duration exercises always get exactly one set.
    /// Performance sets are initialized in lock-step, all nulled out.
    pub fn from_proposal(proposal: &ExerciseProposal) -> Self {
        let count = set_count(proposal);

        let prescription_sets: Vec<PrescribedSet> =
            (0..count).map(|i| prescribed_set(proposal, i)).collect();
        let performance_sets = vec![PerformedSet::default(); count];

        let name = proposal.name.trim();
        let name = if name.is_empty() {
            "Exercise".to_string()
        } else {
            name.to_string()
        };

        Payload {
            schema_version: SCHEMA_VERSION,
            identity: Identity {
                name,
                kind: proposal.kind,
            },
            prescription: Prescription {
                sets: prescription_sets,
                rest_sec: proposal.rest_sec,
            },
            performance: Performance {
                sets: performance_sets,
            },
            flags: PayloadFlags::default(),
            rpe: None,
            note: None,
        }
    }
}

fn set_count(proposal: &ExerciseProposal) -> usize {
    if proposal.kind == ExerciseKind::Duration {
        return 1;
    }

    let from_arrays = proposal
        .reps
        .as_ref()
        .map(Vec::len)
        .filter(|n| *n > 0)
        .or_else(|| proposal.holds_sec.as_ref().map(Vec::len).filter(|n| *n > 0))
        .or_else(|| proposal.loads.as_ref().map(Vec::len).filter(|n| *n > 0));

    let count = proposal
        .sets
        .map(|s| s as usize)
        .or(from_arrays)
        .or_else(|| {
            if proposal.kind == ExerciseKind::Intervals {
                proposal.rounds.map(|r| r as usize)
            } else {
                None
            }
        })
        .unwrap_or(1);

    count.clamp(1, MAX_SETS)
}

/// Index into a per-set target array, repeating the last entry when the
/// array is shorter than the set count.
fn per_set<T: Copy>(values: &Option<Vec<T>>, index: usize) -> Option<T> {
    values
        .as_ref()
        .and_then(|v| v.get(index).or_else(|| v.last()))
        .copied()
}

fn prescribed_set(proposal: &ExerciseProposal, index: usize) -> PrescribedSet {
    match proposal.kind {
        ExerciseKind::Reps => {
            let load = per_set(&proposal.loads, index);
            PrescribedSet {
                reps: per_set(&proposal.reps, index),
                load,
                load_unit: load.map(|_| proposal.load_unit.unwrap_or_default()),
                duration_sec: None,
                distance_m: None,
            }
        }
        ExerciseKind::Hold => PrescribedSet {
            duration_sec: per_set(&proposal.holds_sec, index),
            ..PrescribedSet::default()
        },
        ExerciseKind::Duration => PrescribedSet {
            duration_sec: proposal.duration_minutes.map(|m| m.saturating_mul(60)),
            distance_m: proposal.distance_m,
            ..PrescribedSet::default()
        },
        ExerciseKind::Intervals => PrescribedSet {
            duration_sec: proposal.work_sec,
            ..PrescribedSet::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reps_proposal() -> ExerciseProposal {
        ExerciseProposal {
            name: "Goblet Squat".to_string(),
            kind: ExerciseKind::Reps,
            sets: None,
            reps: Some(vec![10, 8, 6]),
            loads: Some(vec![16.0]),
            load_unit: Some(LoadUnit::Kg),
            holds_sec: None,
            duration_minutes: None,
            distance_m: None,
            rounds: None,
            work_sec: None,
            rest_sec: Some(90),
        }
    }

    #[test]
    fn test_reps_proposal_builds_aligned_sets() {
        let payload = Payload::from_proposal(&reps_proposal());

        assert_eq!(payload.schema_version, SCHEMA_VERSION);
        assert_eq!(payload.prescription.sets.len(), 3);
        assert_eq!(payload.performance.sets.len(), 3);
        assert_eq!(payload.prescription.sets[0].reps, Some(10));
        assert_eq!(payload.prescription.sets[2].reps, Some(6));
        // Short load array repeats its last entry
        assert_eq!(payload.prescription.sets[2].load, Some(16.0));
        assert_eq!(payload.prescription.sets[2].load_unit, Some(LoadUnit::Kg));
        assert_eq!(payload.prescription.rest_sec, Some(90));
        assert!(payload.performance.sets.iter().all(|s| !s.has_effort()));
    }

    #[test]
    fn test_explicit_sets_override_array_length() {
        let proposal = ExerciseProposal {
            sets: Some(5),
            ..reps_proposal()
        };
        let payload = Payload::from_proposal(&proposal);
        assert_eq!(payload.prescription.sets.len(), 5);
        assert_eq!(payload.performance.sets.len(), 5);
    }

    #[test]
    fn test_duration_proposal_gets_one_set_in_seconds() {
        let proposal = ExerciseProposal {
            name: "Zone 2 Run".to_string(),
            kind: ExerciseKind::Duration,
            sets: Some(4), // ignored for duration type
            reps: None,
            loads: None,
            load_unit: None,
            holds_sec: None,
            duration_minutes: Some(20),
            distance_m: Some(3000.0),
            rounds: None,
            work_sec: None,
            rest_sec: None,
        };
        let payload = Payload::from_proposal(&proposal);

        assert_eq!(payload.prescription.sets.len(), 1);
        assert_eq!(payload.prescription.sets[0].duration_sec, Some(1200));
        assert_eq!(payload.prescription.sets[0].distance_m, Some(3000.0));
    }

    #[test]
    fn test_intervals_proposal_uses_rounds_and_work_interval() {
        let proposal = ExerciseProposal {
            name: "Bike Sprints".to_string(),
            kind: ExerciseKind::Intervals,
            sets: None,
            reps: None,
            loads: None,
            load_unit: None,
            holds_sec: None,
            duration_minutes: None,
            distance_m: None,
            rounds: Some(6),
            work_sec: Some(30),
            rest_sec: Some(60),
        };
        let payload = Payload::from_proposal(&proposal);

        assert_eq!(payload.prescription.sets.len(), 6);
        assert!(payload
            .prescription
            .sets
            .iter()
            .all(|s| s.duration_sec == Some(30)));
    }

    #[test]
    fn test_malformed_proposal_is_defaulted() {
        let proposal: ExerciseProposal = serde_json::from_value(serde_json::json!({})).unwrap();
        let payload = Payload::from_proposal(&proposal);

        assert_eq!(payload.identity.name, "Exercise");
        assert_eq!(payload.identity.kind, ExerciseKind::Reps);
        assert_eq!(payload.prescription.sets.len(), 1);
    }

    #[test]
    fn test_set_count_is_clamped() {
        let proposal = ExerciseProposal {
            sets: Some(10_000),
            ..reps_proposal()
        };
        let payload = Payload::from_proposal(&proposal);
        assert_eq!(payload.prescription.sets.len(), MAX_SETS);
    }

    #[test]
    fn test_migrate_current_version_round_trips() {
        let payload = Payload::from_proposal(&reps_proposal());
        let value = serde_json::to_value(&payload).unwrap();
        let migrated = migrate(value).unwrap();
        assert_eq!(migrated, payload);
    }

    #[test]
    fn test_migrate_v1_preserves_data() {
        let v1 = serde_json::json!({
            "schema_version": 1,
            "name": "Push Up",
            "kind": "reps",
            "sets": [
                {"target_reps": 12, "reps": 12, "rpe": 7,
                 "completed_at": "2026-03-01T10:00:00Z"},
                {"target_reps": 12}
            ],
            "rest_sec": 60,
            "pain": false,
            "modified": true
        });

        let payload = migrate(v1).unwrap();

        assert_eq!(payload.schema_version, SCHEMA_VERSION);
        assert_eq!(payload.identity.name, "Push Up");
        assert_eq!(payload.prescription.sets.len(), 2);
        assert_eq!(payload.performance.sets.len(), 2);
        assert_eq!(payload.prescription.sets[0].reps, Some(12));
        assert_eq!(payload.performance.sets[0].reps, Some(12));
        assert_eq!(payload.performance.sets[0].rpe, Some(7));
        assert!(payload.performance.sets[0].completed_at.is_some());
        assert!(!payload.performance.sets[1].has_effort());
        assert!(payload.flags.modified);
        assert_eq!(payload.flags.skip_reason, None);
    }

    #[test]
    fn test_migrate_missing_schema_version_reads_as_v1() {
        let legacy = serde_json::json!({
            "name": "Plank",
            "kind": "hold",
            "sets": [{"target_duration_sec": 45}]
        });

        let payload = migrate(legacy).unwrap();
        assert_eq!(payload.identity.kind, ExerciseKind::Hold);
        assert_eq!(payload.prescription.sets[0].duration_sec, Some(45));
    }

    #[test]
    fn test_migrate_rejects_newer_schema() {
        let future = serde_json::json!({"schema_version": 3, "name": "?", "kind": "reps"});
        let err = migrate(future).unwrap_err();
        assert!(matches!(
            err,
            AppError::UnsupportedSchemaVersion {
                found: 3,
                supported: SCHEMA_VERSION
            }
        ));
    }
}
