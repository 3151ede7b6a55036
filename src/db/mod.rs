//! Database layer.
//!
//! Services talk to storage only through [`Store`]. Two backends exist:
//! Firestore for deployments and an in-process store for tests and local
//! development.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::achievement::CATALOG;
use crate::models::{
    Achievement, Activity, ActivityType, Participation, User, UserAchievement, XpUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const ACTIVITY_TYPES: &str = "activity_types";
    pub const ACTIVITIES: &str = "activities";
    /// Keyed by `{activity_id}_{user_id}`
    pub const PARTICIPATIONS: &str = "participations";
    pub const ACHIEVEMENTS: &str = "achievements";
    /// Keyed by `{user_id}_{achievement_id}`
    pub const USER_ACHIEVEMENTS: &str = "user_achievements";
}

/// Repository-style access to persisted state.
///
/// Uniqueness of participations and user achievements, the XP increment and
/// the once-only markers are enforced by the backend, not by callers.
///
/// `upsert_*` calls write whole documents and are meant for creation and
/// reference data. Changes to existing records go through the field-scoped
/// calls so they never overwrite concurrent updates.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn upsert_user(&self, user: &User) -> Result<(), AppError>;

    /// Atomically add `amount` XP. Fails with `NotFound` for unknown users.
    async fn increment_xp(&self, user_id: Uuid, amount: u64) -> Result<XpUpdate, AppError>;

    /// Store `level` if it is higher than the stored level.
    async fn raise_level(&self, user_id: Uuid, level: u32) -> Result<(), AppError>;

    /// Replace the preferred activity types.
    async fn set_preferences(&self, user_id: Uuid, type_ids: &[Uuid]) -> Result<(), AppError>;

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> Result<(), AppError>;

    /// Set `deleted_at` unless already set.
    ///
    /// Returns `false` when the user was already deactivated.
    async fn mark_user_deleted(
        &self,
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    // ─── Activity Types ──────────────────────────────────────────

    async fn list_activity_types(&self) -> Result<Vec<ActivityType>, AppError>;

    async fn get_activity_type(&self, type_id: Uuid) -> Result<Option<ActivityType>, AppError>;

    async fn upsert_activity_type(&self, activity_type: &ActivityType) -> Result<(), AppError>;

    // ─── Activities ──────────────────────────────────────────────

    /// Get an activity, including deleted and completed ones.
    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError>;

    /// Non-deleted activity with exactly this title, if any.
    async fn find_active_activity_by_title(
        &self,
        title: &str,
    ) -> Result<Option<Activity>, AppError>;

    /// All non-deleted activities.
    async fn list_active_activities(&self) -> Result<Vec<Activity>, AppError>;

    /// Number of activities ever created by `creator_id`.
    async fn count_activities_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError>;

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Write the editable fields (title, description, type, image, schedule,
    /// privacy, address). Completion and deletion markers are left alone.
    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Set `deleted_at` unless already set.
    ///
    /// Returns `false` when the activity was already deleted.
    async fn mark_activity_deleted(
        &self,
        activity_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Set `completed_at` unless already set.
    ///
    /// Returns `false` when the activity was already completed.
    async fn mark_activity_completed(
        &self,
        activity_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    // ─── Participations ──────────────────────────────────────────

    async fn get_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participation>, AppError>;

    /// Insert a new participation.
    ///
    /// Returns `false` when a record for the pair already exists.
    async fn insert_participation(&self, participation: &Participation) -> Result<bool, AppError>;

    /// Record the creator's decision unless the participant has checked in.
    ///
    /// Returns `false` when `confirmed_at` is already set. Fails with
    /// `NotFound` when the participation no longer exists.
    async fn decide_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        approved: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Set `confirmed_at` unless already set.
    ///
    /// Returns `false` when the participant had already checked in or is not
    /// approved.
    async fn confirm_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Delete a participation that has not been checked in.
    ///
    /// Returns `false` when `confirmed_at` is set.
    async fn delete_unconfirmed_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn list_participations_for_activity(
        &self,
        activity_id: Uuid,
    ) -> Result<Vec<Participation>, AppError>;

    async fn list_participations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Participation>, AppError>;

    /// Explicit approvals (not auto-approvals) made by `creator_id`.
    async fn count_approvals_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError>;

    // ─── Achievements ────────────────────────────────────────────

    async fn find_achievement_by_name(&self, name: &str) -> Result<Option<Achievement>, AppError>;

    async fn list_achievements(&self) -> Result<Vec<Achievement>, AppError>;

    async fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), AppError>;

    /// Record a grant.
    ///
    /// Returns `false` when the user already holds the achievement.
    async fn insert_user_achievement(&self, grant: &UserAchievement) -> Result<bool, AppError>;

    async fn list_user_achievements(&self, user_id: Uuid)
        -> Result<Vec<UserAchievement>, AppError>;
}

/// Default activity types: (name, description).
pub const DEFAULT_ACTIVITY_TYPES: &[(&str, &str)] = &[
    ("Corrida", "Corridas de rua e trilhas"),
    ("Ciclismo", "Pedais urbanos e de estrada"),
    ("Caminhada", "Caminhadas e trekking"),
    ("Futebol", "Partidas de futebol e futsal"),
    ("Jogos de tabuleiro", "Encontros para jogos de mesa"),
];

/// Insert catalog achievements and default activity types that are missing.
///
/// Safe to run on every startup.
pub async fn seed_reference_data(store: &dyn Store) -> Result<(), AppError> {
    let mut seeded_achievements = 0;
    for (name, criterion) in CATALOG {
        if store.find_achievement_by_name(name).await?.is_none() {
            store
                .upsert_achievement(&Achievement {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    criterion: criterion.to_string(),
                })
                .await?;
            seeded_achievements += 1;
        }
    }

    let mut seeded_types = 0;
    if store.list_activity_types().await?.is_empty() {
        for (name, description) in DEFAULT_ACTIVITY_TYPES {
            store
                .upsert_activity_type(&ActivityType {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    description: description.to_string(),
                    image: None,
                })
                .await?;
            seeded_types += 1;
        }
    }

    tracing::info!(
        achievements = seeded_achievements,
        activity_types = seeded_types,
        "Reference data seeded"
    );
    Ok(())
}
