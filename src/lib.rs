// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Partiu: find partners for sports and social activities
//!
//! This crate provides the backend API for creating activities, managing
//! who takes part in them, and rewarding participation with XP, levels
//! and achievements.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::Store;
use services::{ActivityService, CodeGenerator, EffectDispatcher, ImageUploader, UserService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub activities: ActivityService,
    pub users: UserService,
}

impl AppState {
    /// Wire the services around a store and an image uploader.
    pub fn new(config: Config, store: Arc<dyn Store>, uploader: Arc<dyn ImageUploader>) -> Self {
        let dispatcher = EffectDispatcher::new(store.clone());
        let activities = ActivityService::new(
            store.clone(),
            dispatcher,
            uploader.clone(),
            CodeGenerator::new(),
        );
        let users = UserService::new(store.clone(), uploader);

        Self {
            config,
            store,
            activities,
            users,
        }
    }
}
