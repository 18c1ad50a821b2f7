// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the external workout instance generator.
//!
//! The generator proposes an initial exercise list for a new session. Its
//! response is untrusted: every field is optional on the wire and
//! defaulted before it becomes a payload (see `models::payload`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::payload::ExerciseProposal;
use crate::models::session::CoachMode;

/// User context sent to the generator.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorContext {
    pub user_id: String,
    pub intent: Option<String>,
    pub coach_mode: CoachMode,
}

/// Constraints sent to the generator.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorConstraints {
    pub time_available_min: Option<u32>,
    pub equipment: Vec<String>,
}

/// Generator response: one proposed workout instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlan {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub estimated_duration_min: Option<u32>,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default)]
    pub exercises: Vec<ExerciseProposal>,
}

/// Workout instance generator.
#[async_trait]
pub trait WorkoutGenerator: Send + Sync {
    async fn generate(
        &self,
        context: &GeneratorContext,
        constraints: &GeneratorConstraints,
    ) -> Result<GeneratedPlan>;
}

/// HTTP client for the production generator service.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    context: &'a GeneratorContext,
    constraints: &'a GeneratorConstraints,
}

impl HttpGenerator {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl WorkoutGenerator for HttpGenerator {
    async fn generate(
        &self,
        context: &GeneratorContext,
        constraints: &GeneratorConstraints,
    ) -> Result<GeneratedPlan> {
        let url = format!("{}/v1/generate", self.base_url);

        tracing::debug!(user_id = %context.user_id, url = %url, "Requesting workout instance");

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                context,
                constraints,
            })
            .send()
            .await
            .map_err(|e| AppError::Generator(format!("Generator request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Generator(format!(
                "Generator returned status {}",
                response.status()
            )));
        }

        let plan: GeneratedPlan = response
            .json()
            .await
            .map_err(|e| AppError::Generator(format!("Malformed generator response: {}", e)))?;

        if plan.exercises.is_empty() {
            return Err(AppError::Generator(
                "Generator returned no exercises".to_string(),
            ));
        }

        Ok(plan)
    }
}

/// Canned generator for tests and offline development.
pub struct StaticGenerator {
    plan: GeneratedPlan,
    /// When set, `generate` fails instead of returning the plan.
    fail: bool,
}

impl StaticGenerator {
    pub fn new(plan: GeneratedPlan) -> Self {
        Self { plan, fail: false }
    }

    /// A generator that always fails, for rollback tests.
    pub fn failing() -> Self {
        Self {
            plan: GeneratedPlan {
                title: String::new(),
                category: String::new(),
                estimated_duration_min: None,
                focus: vec![],
                exercises: vec![],
            },
            fail: true,
        }
    }
}

#[async_trait]
impl WorkoutGenerator for StaticGenerator {
    async fn generate(
        &self,
        _context: &GeneratorContext,
        _constraints: &GeneratorConstraints,
    ) -> Result<GeneratedPlan> {
        if self.fail {
            return Err(AppError::Generator("Generator unavailable".to_string()));
        }
        Ok(self.plan.clone())
    }
}
