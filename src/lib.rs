// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout-Tracker: in-progress workout sessions as versioned records
//!
//! This crate provides the backend API for tracking a workout session as
//! a sequence of client-issued commands applied to versioned exercise
//! records, with idempotent retries and optimistic concurrency.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{CommandService, SessionService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub commands: CommandService,
    pub sessions: SessionService,
}
