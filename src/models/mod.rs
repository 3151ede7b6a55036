// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod achievement;
pub mod activity;
pub mod participation;
pub mod user;

pub use achievement::{Achievement, UserAchievement};
pub use activity::{Activity, ActivityAddress, ActivityType};
pub use participation::{Participation, ParticipationState};
pub use user::{User, XpUpdate};
