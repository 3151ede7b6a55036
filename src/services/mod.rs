// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod confirmation;
pub mod effects;
pub mod participation;
pub mod progression;
pub mod upload;
pub mod users;

pub use activity::ActivityService;
pub use confirmation::CodeGenerator;
pub use effects::{EffectDispatcher, Rewards};
pub use upload::{DisabledImageUploader, HttpImageUploader, ImageUploader, MockImageUploader};
pub use users::UserService;
