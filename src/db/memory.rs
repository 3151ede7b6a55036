// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by concurrent maps.
//!
//! Every operation that the Firestore backend performs atomically is done
//! under a single shard lock here, so the same uniqueness and increment
//! guarantees hold.

use super::Store;
use crate::error::AppError;
use crate::models::{
    Achievement, Activity, ActivityType, Participation, User, UserAchievement, XpUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    activity_types: DashMap<Uuid, ActivityType>,
    activities: DashMap<Uuid, Activity>,
    participations: DashMap<(Uuid, Uuid), Participation>,
    achievements: DashMap<Uuid, Achievement>,
    user_achievements: DashMap<(Uuid, Uuid), UserAchievement>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_mut(&self, user_id: Uuid) -> Result<RefMut<'_, Uuid, User>, AppError> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    fn participation_mut(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<RefMut<'_, (Uuid, Uuid), Participation>, AppError> {
        self.participations
            .get_mut(&(activity_id, user_id))
            .ok_or_else(|| AppError::NotFound("Participation not found".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn increment_xp(&self, user_id: Uuid, amount: u64) -> Result<XpUpdate, AppError> {
        let mut user = self.user_mut(user_id)?;
        user.xp = user.xp.saturating_add(amount);
        Ok(XpUpdate {
            xp: user.xp,
            level: user.level,
        })
    }

    async fn raise_level(&self, user_id: Uuid, level: u32) -> Result<(), AppError> {
        let mut user = self.user_mut(user_id)?;
        user.level = user.level.max(level);
        Ok(())
    }

    async fn set_preferences(&self, user_id: Uuid, type_ids: &[Uuid]) -> Result<(), AppError> {
        self.user_mut(user_id)?.preferred_type_ids = type_ids.to_vec();
        Ok(())
    }

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> Result<(), AppError> {
        self.user_mut(user_id)?.avatar_url = Some(avatar_url.to_string());
        Ok(())
    }

    async fn mark_user_deleted(
        &self,
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut user = self.user_mut(user_id)?;
        if user.deleted_at.is_some() {
            return Ok(false);
        }
        user.deleted_at = Some(deleted_at);
        Ok(true)
    }

    async fn list_activity_types(&self) -> Result<Vec<ActivityType>, AppError> {
        let mut types: Vec<ActivityType> =
            self.activity_types.iter().map(|t| t.clone()).collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn get_activity_type(&self, type_id: Uuid) -> Result<Option<ActivityType>, AppError> {
        Ok(self.activity_types.get(&type_id).map(|t| t.clone()))
    }

    async fn upsert_activity_type(&self, activity_type: &ActivityType) -> Result<(), AppError> {
        self.activity_types
            .insert(activity_type.id, activity_type.clone());
        Ok(())
    }

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError> {
        Ok(self.activities.get(&activity_id).map(|a| a.clone()))
    }

    async fn find_active_activity_by_title(
        &self,
        title: &str,
    ) -> Result<Option<Activity>, AppError> {
        Ok(self
            .activities
            .iter()
            .find(|a| a.title == title && !a.is_deleted())
            .map(|a| a.clone()))
    }

    async fn list_active_activities(&self) -> Result<Vec<Activity>, AppError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| !a.is_deleted())
            .map(|a| a.clone())
            .collect())
    }

    async fn count_activities_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError> {
        Ok(self
            .activities
            .iter()
            .filter(|a| a.creator_id == creator_id)
            .count())
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        match self.activities.entry(activity.id) {
            Entry::Occupied(_) => Err(AppError::Database(format!(
                "Activity {} already exists",
                activity.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(activity.clone());
                Ok(())
            }
        }
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let mut stored = self
            .activities
            .get_mut(&activity.id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity.id)))?;
        stored.title = activity.title.clone();
        stored.description = activity.description.clone();
        stored.type_id = activity.type_id;
        stored.image = activity.image.clone();
        stored.scheduled_date = activity.scheduled_date;
        stored.private = activity.private;
        stored.address = activity.address;
        Ok(())
    }

    async fn mark_activity_deleted(
        &self,
        activity_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut activity = self
            .activities
            .get_mut(&activity_id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;
        if activity.deleted_at.is_some() {
            return Ok(false);
        }
        activity.deleted_at = Some(deleted_at);
        Ok(true)
    }

    async fn mark_activity_completed(
        &self,
        activity_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut activity = self
            .activities
            .get_mut(&activity_id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;
        if activity.completed_at.is_some() {
            return Ok(false);
        }
        activity.completed_at = Some(completed_at);
        Ok(true)
    }

    async fn get_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participation>, AppError> {
        Ok(self
            .participations
            .get(&(activity_id, user_id))
            .map(|p| p.clone()))
    }

    async fn insert_participation(&self, participation: &Participation) -> Result<bool, AppError> {
        match self
            .participations
            .entry((participation.activity_id, participation.user_id))
        {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(participation.clone());
                Ok(true)
            }
        }
    }

    async fn decide_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        approved: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut participation = self.participation_mut(activity_id, user_id)?;
        if participation.is_confirmed() {
            return Ok(false);
        }
        participation.approved = Some(approved);
        participation.decided_at = Some(decided_at);
        Ok(true)
    }

    async fn confirm_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut participation = self.participation_mut(activity_id, user_id)?;
        if participation.is_confirmed() || participation.approved != Some(true) {
            return Ok(false);
        }
        participation.confirmed_at = Some(confirmed_at);
        Ok(true)
    }

    async fn delete_unconfirmed_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        match self.participations.entry((activity_id, user_id)) {
            Entry::Vacant(_) => Err(AppError::NotFound("Participation not found".to_string())),
            Entry::Occupied(slot) if slot.get().is_confirmed() => Ok(false),
            Entry::Occupied(slot) => {
                slot.remove();
                Ok(true)
            }
        }
    }

    async fn list_participations_for_activity(
        &self,
        activity_id: Uuid,
    ) -> Result<Vec<Participation>, AppError> {
        let mut participations: Vec<Participation> = self
            .participations
            .iter()
            .filter(|p| p.activity_id == activity_id)
            .map(|p| p.clone())
            .collect();
        participations.sort_by_key(|p| p.subscribed_at);
        Ok(participations)
    }

    async fn list_participations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Participation>, AppError> {
        Ok(self
            .participations
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.clone())
            .collect())
    }

    async fn count_approvals_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError> {
        Ok(self
            .participations
            .iter()
            .filter(|p| {
                p.creator_id == creator_id && p.approved == Some(true) && p.decided_at.is_some()
            })
            .count())
    }

    async fn find_achievement_by_name(&self, name: &str) -> Result<Option<Achievement>, AppError> {
        Ok(self
            .achievements
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.clone()))
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, AppError> {
        let mut achievements: Vec<Achievement> =
            self.achievements.iter().map(|a| a.clone()).collect();
        achievements.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(achievements)
    }

    async fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), AppError> {
        self.achievements
            .insert(achievement.id, achievement.clone());
        Ok(())
    }

    async fn insert_user_achievement(&self, grant: &UserAchievement) -> Result<bool, AppError> {
        match self
            .user_achievements
            .entry((grant.user_id, grant.achievement_id))
        {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(grant.clone());
                Ok(true)
            }
        }
    }

    async fn list_user_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserAchievement>, AppError> {
        let mut grants: Vec<UserAchievement> = self
            .user_achievements
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.clone())
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participation(activity_id: Uuid, user_id: Uuid) -> Participation {
        Participation {
            activity_id,
            user_id,
            creator_id: Uuid::new_v4(),
            approved: Some(true),
            decided_at: None,
            confirmed_at: None,
            subscribed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_participation_pair_is_unique() {
        let store = MemoryStore::new();
        let (activity_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap());
        assert!(!store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap());
        assert_eq!(
            store
                .list_participations_for_activity(activity_id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_confirm_participation_only_once() {
        let store = MemoryStore::new();
        let (activity_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store
            .confirm_participation(activity_id, user_id, now)
            .await
            .unwrap());
        assert!(!store
            .confirm_participation(activity_id, user_id, Utc::now())
            .await
            .unwrap());

        let stored = store
            .get_participation(activity_id, user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.confirmed_at, Some(now));

        let err = store
            .confirm_participation(Uuid::new_v4(), user_id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_decision_refused_after_check_in() {
        let store = MemoryStore::new();
        let (activity_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap();
        store
            .confirm_participation(activity_id, user_id, Utc::now())
            .await
            .unwrap();

        assert!(!store
            .decide_participation(activity_id, user_id, false, Utc::now())
            .await
            .unwrap());

        let stored = store
            .get_participation(activity_id, user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.confirmed_at.is_some());
        assert_eq!(stored.approved, Some(true));
        assert_eq!(stored.decided_at, None);

        // Withdrawn participations are not brought back by a late decision
        let err = store
            .decide_participation(Uuid::new_v4(), user_id, true, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejected_participant_cannot_be_confirmed() {
        let store = MemoryStore::new();
        let (activity_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap();
        assert!(store
            .decide_participation(activity_id, user_id, false, Utc::now())
            .await
            .unwrap());

        assert!(!store
            .confirm_participation(activity_id, user_id, Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_keeps_confirmed_participation() {
        let store = MemoryStore::new();
        let (activity_id, user_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_participation(&participation(activity_id, user_id))
            .await
            .unwrap();
        store
            .confirm_participation(activity_id, user_id, Utc::now())
            .await
            .unwrap();

        assert!(!store
            .delete_unconfirmed_participation(activity_id, user_id)
            .await
            .unwrap());
        assert!(store
            .get_participation(activity_id, user_id)
            .await
            .unwrap()
            .is_some());

        let other = Uuid::new_v4();
        store
            .insert_participation(&participation(activity_id, other))
            .await
            .unwrap();
        assert!(store
            .delete_unconfirmed_participation(activity_id, other)
            .await
            .unwrap());
        assert!(matches!(
            store.delete_unconfirmed_participation(activity_id, other).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_profile_writes_keep_progression() {
        let store = MemoryStore::new();
        let user = User::new("Ana", "ana@example.com", "111", "hash");
        store.upsert_user(&user).await.unwrap();
        store.increment_xp(user.id, 150).await.unwrap();
        store.raise_level(user.id, 2).await.unwrap();

        let type_id = Uuid::new_v4();
        store.set_preferences(user.id, &[type_id]).await.unwrap();
        store
            .set_avatar_url(user.id, "https://img.example.com/a.png")
            .await
            .unwrap();
        assert!(store.mark_user_deleted(user.id, Utc::now()).await.unwrap());
        assert!(!store.mark_user_deleted(user.id, Utc::now()).await.unwrap());

        let stored = store.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.xp, 150);
        assert_eq!(stored.level, 2);
        assert_eq!(stored.preferred_type_ids, vec![type_id]);
        assert_eq!(
            stored.avatar_url.as_deref(),
            Some("https://img.example.com/a.png")
        );
        assert!(stored.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_update_activity_keeps_markers() {
        use crate::models::ActivityAddress;

        let store = MemoryStore::new();
        let activity = Activity {
            id: Uuid::new_v4(),
            title: "Trilha".to_string(),
            description: String::new(),
            type_id: Uuid::new_v4(),
            image: None,
            confirmation_code: "ABCDE".to_string(),
            scheduled_date: Utc::now(),
            created_at: Utc::now(),
            completed_at: None,
            deleted_at: None,
            private: false,
            creator_id: Uuid::new_v4(),
            address: ActivityAddress {
                latitude: 0.0,
                longitude: 0.0,
            },
        };
        store.insert_activity(&activity).await.unwrap();
        assert!(store
            .mark_activity_completed(activity.id, Utc::now())
            .await
            .unwrap());

        // Stale copy without the completion marker
        let mut edited = activity.clone();
        edited.title = "Trilha longa".to_string();
        store.update_activity(&edited).await.unwrap();

        let stored = store.get_activity(activity.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Trilha longa");
        assert!(stored.completed_at.is_some());

        assert!(store
            .mark_activity_deleted(activity.id, Utc::now())
            .await
            .unwrap());
        assert!(!store
            .mark_activity_deleted(activity.id, Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_increment_xp_unknown_user() {
        let store = MemoryStore::new();
        let err = store.increment_xp(Uuid::new_v4(), 10).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_raise_level_never_lowers() {
        let store = MemoryStore::new();
        let mut user = User::new("Ana", "ana@example.com", "111", "hash");
        user.level = 4;
        store.upsert_user(&user).await.unwrap();

        store.raise_level(user.id, 2).await.unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().level, 4);

        store.raise_level(user.id, 6).await.unwrap();
        assert_eq!(store.get_user(user.id).await.unwrap().unwrap().level, 6);
    }

    #[tokio::test]
    async fn test_seed_reference_data_is_idempotent() {
        let store = MemoryStore::new();
        crate::db::seed_reference_data(&store).await.unwrap();
        crate::db::seed_reference_data(&store).await.unwrap();

        assert_eq!(
            store.list_achievements().await.unwrap().len(),
            crate::models::achievement::CATALOG.len()
        );
        assert_eq!(
            store.list_activity_types().await.unwrap().len(),
            crate::db::DEFAULT_ACTIVITY_TYPES.len()
        );
    }
}
