// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile operations.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Achievement, User};
use crate::services::progression::xp_to_reach;
use crate::services::upload::{ImageUpload, ImageUploader};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct EarnedAchievement {
    pub name: String,
    pub granted_at: DateTime<Utc>,
}

/// The caller's own profile with progression.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp: u64,
    pub level: u32,
    /// Total XP at which the next level is reached
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub next_level_xp: u64,
    pub preferred_type_ids: Vec<Uuid>,
    pub achievements: Vec<EarnedAchievement>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    uploader: Arc<dyn ImageUploader>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, uploader: Arc<dyn ImageUploader>) -> Self {
        Self { store, uploader }
    }

    /// Load a user that has not been deactivated.
    pub async fn active_user(&self, user_id: Uuid) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .filter(User::is_active)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserProfile> {
        let user = self.active_user(user_id).await?;
        let achievements = self
            .store
            .list_user_achievements(user_id)
            .await?
            .into_iter()
            .map(|g| EarnedAchievement {
                name: g.achievement_name,
                granted_at: g.granted_at,
            })
            .collect();

        Ok(UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
            xp: user.xp,
            level: user.level,
            next_level_xp: xp_to_reach(user.level.saturating_add(1)),
            preferred_type_ids: user.preferred_type_ids,
            achievements,
        })
    }

    /// Replace the preferred activity types. Every ID must be a known type.
    pub async fn set_preferences(&self, user_id: Uuid, type_ids: Vec<Uuid>) -> Result<UserProfile> {
        self.active_user(user_id).await?;

        let known: HashSet<Uuid> = self
            .store
            .list_activity_types()
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        if let Some(unknown) = type_ids.iter().find(|id| !known.contains(id)) {
            return Err(AppError::BadRequest(format!(
                "Activity type {} does not exist",
                unknown
            )));
        }

        let mut seen = HashSet::new();
        let preferred: Vec<Uuid> = type_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        self.store.set_preferences(user_id, &preferred).await?;

        tracing::info!(%user_id, preferences = preferred.len(), "Preferences updated");
        self.profile(user_id).await
    }

    pub async fn update_avatar(&self, user_id: Uuid, image: &ImageUpload) -> Result<UserProfile> {
        self.active_user(user_id).await?;
        let avatar_url = self.uploader.upload_image(image).await?;
        self.store.set_avatar_url(user_id, &avatar_url).await?;

        tracing::info!(%user_id, "Avatar updated");
        self.profile(user_id).await
    }

    /// Soft delete. Deactivated users can no longer authenticate.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<()> {
        self.active_user(user_id).await?;
        if !self.store.mark_user_deleted(user_id, Utc::now()).await? {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        tracing::info!(%user_id, "User deactivated");
        Ok(())
    }

    pub async fn list_achievements(&self) -> Result<Vec<Achievement>> {
        self.store.list_achievements().await
    }
}
