// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Business logic services.

pub mod commands;
pub mod generator;
pub mod reducer;
pub mod session;

pub use commands::{CommandOutcome, CommandService};
pub use generator::{HttpGenerator, StaticGenerator, WorkoutGenerator};
pub use session::{SessionDetail, SessionService};
