// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity lifecycle orchestration.
//!
//! Each operation follows the same shape:
//! 1. Load the activity (and participation) from the store
//! 2. Validate the transition (pure rules in `participation`)
//! 3. Persist the new state
//! 4. Dispatch the gamification effects the transition earned
//!
//! A failed precondition returns before anything is written.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{
    Activity, ActivityAddress, ActivityType, Participation, ParticipationState,
};
use crate::services::confirmation::CodeGenerator;
use crate::services::effects::{EffectDispatcher, Rewards};
use crate::services::participation;
use crate::services::upload::{ImageUpload, ImageUploader};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

const MAX_CONCURRENT_DB_OPS: usize = 16;

/// Largest page size for activity listings.
pub const MAX_PER_PAGE: u32 = 100;

// ─── Inputs ──────────────────────────────────────────────────

/// Coordinates as received; both parts are required by create/update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct AddressInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub description: String,
    pub type_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub private: bool,
    pub address: Option<AddressInput>,
    pub image: Option<ImageUpload>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ActivityChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub type_id: Option<Uuid>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub private: Option<bool>,
    pub address: Option<AddressInput>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub type_id: Option<Uuid>,
    pub order: SortOrder,
    /// 1-indexed; `None` returns everything, preferred types first
    pub page: Option<u32>,
    pub per_page: u32,
}

// ─── Outputs ─────────────────────────────────────────────────

/// A result together with the rewards its transition produced.
#[derive(Debug, Serialize)]
pub struct Applied<T> {
    #[serde(flatten)]
    pub value: T,
    pub rewards: Rewards,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub type_id: Uuid,
    pub image: Option<String>,
    pub scheduled_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub private: bool,
    pub creator_id: Uuid,
    pub address: ActivityAddress,
    /// Only shown to the creator
    pub confirmation_code: Option<String>,
    /// The viewer's own participation, if any
    pub viewer_state: Option<ParticipationState>,
}

impl ActivityView {
    fn new(activity: Activity, viewer_id: Uuid, viewer_state: Option<ParticipationState>) -> Self {
        let confirmation_code =
            (activity.creator_id == viewer_id).then_some(activity.confirmation_code);
        Self {
            id: activity.id,
            title: activity.title,
            description: activity.description,
            type_id: activity.type_id,
            image: activity.image,
            scheduled_date: activity.scheduled_date,
            created_at: activity.created_at,
            completed_at: activity.completed_at,
            private: activity.private,
            creator_id: activity.creator_id,
            address: activity.address,
            confirmation_code,
            viewer_state,
        }
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityPage {
    pub activities: Vec<ActivityView>,
    pub page: Option<u32>,
    pub per_page: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ParticipationView {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub approved: Option<bool>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub state: ParticipationState,
}

impl From<&Participation> for ParticipationView {
    fn from(p: &Participation) -> Self {
        Self {
            activity_id: p.activity_id,
            user_id: p.user_id,
            approved: p.approved,
            confirmed_at: p.confirmed_at,
            state: p.state(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ParticipantView {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub approved: Option<bool>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub state: ParticipationState,
}

// ─── Service ─────────────────────────────────────────────────

/// Orchestrates activity and participation transitions.
#[derive(Clone)]
pub struct ActivityService {
    store: Arc<dyn Store>,
    dispatcher: EffectDispatcher,
    uploader: Arc<dyn ImageUploader>,
    codes: CodeGenerator,
}

impl ActivityService {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: EffectDispatcher,
        uploader: Arc<dyn ImageUploader>,
        codes: CodeGenerator,
    ) -> Self {
        Self {
            store,
            dispatcher,
            uploader,
            codes,
        }
    }

    async fn load_activity(&self, activity_id: Uuid) -> Result<Activity> {
        self.store
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))
    }

    async fn ensure_type_exists(&self, type_id: Uuid) -> Result<()> {
        if self.store.get_activity_type(type_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Activity type {} does not exist",
                type_id
            )));
        }
        Ok(())
    }

    /// Fails if a non-deleted activity other than `except` has this title.
    async fn ensure_title_available(&self, title: &str, except: Option<Uuid>) -> Result<()> {
        if let Some(existing) = self.store.find_active_activity_by_title(title).await? {
            if Some(existing.id) != except {
                return Err(AppError::InvalidState(format!(
                    "An activity titled '{}' already exists",
                    title
                )));
            }
        }
        Ok(())
    }

    // ─── Queries ─────────────────────────────────────────────

    pub async fn list_types(&self) -> Result<Vec<ActivityType>> {
        self.store.list_activity_types().await
    }

    /// List non-deleted activities.
    ///
    /// Without a page, activities of the viewer's preferred types come first;
    /// within each group the requested date order holds.
    pub async fn list_activities(
        &self,
        viewer_id: Uuid,
        filter: &ActivityFilter,
    ) -> Result<ActivityPage> {
        if filter.page == Some(0) {
            return Err(AppError::BadRequest(
                "Page must be greater than 0".to_string(),
            ));
        }
        if filter.per_page == 0 {
            return Err(AppError::BadRequest(
                "per_page must be greater than 0".to_string(),
            ));
        }
        let per_page = filter.per_page.min(MAX_PER_PAGE);

        let mut activities: Vec<Activity> = self
            .store
            .list_active_activities()
            .await?
            .into_iter()
            .filter(|a| filter.type_id.is_none_or(|t| a.type_id == t))
            .collect();

        activities.sort_by(|a, b| {
            let by_date = a
                .scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.created_at.cmp(&b.created_at));
            match filter.order {
                SortOrder::Asc => by_date,
                SortOrder::Desc => by_date.reverse(),
            }
        });

        if filter.page.is_none() {
            let preferred: HashSet<Uuid> = self
                .store
                .get_user(viewer_id)
                .await?
                .map(|u| u.preferred_type_ids.into_iter().collect())
                .unwrap_or_default();
            if !preferred.is_empty() {
                activities.sort_by_key(|a| !preferred.contains(&a.type_id));
            }
        }

        let total = activities.len() as u32;

        let activities = match filter.page {
            Some(page) => {
                let start = (page as usize - 1)
                    .checked_mul(per_page as usize)
                    .ok_or_else(|| {
                        AppError::BadRequest("Page number causes overflow".to_string())
                    })?;
                activities
                    .into_iter()
                    .skip(start)
                    .take(per_page as usize)
                    .collect()
            }
            None => activities,
        };

        let viewer_states: HashMap<Uuid, ParticipationState> = self
            .store
            .list_participations_for_user(viewer_id)
            .await?
            .iter()
            .map(|p| (p.activity_id, p.state()))
            .collect();

        let views = activities
            .into_iter()
            .map(|a| {
                let state = viewer_states.get(&a.id).copied();
                ActivityView::new(a, viewer_id, state)
            })
            .collect();

        Ok(ActivityPage {
            activities: views,
            page: filter.page,
            per_page,
            total,
        })
    }

    pub async fn get_activity(&self, viewer_id: Uuid, activity_id: Uuid) -> Result<ActivityView> {
        let activity = self.load_activity(activity_id).await?;
        if activity.is_deleted() {
            return Err(AppError::NotFound(format!(
                "Activity {} not found",
                activity_id
            )));
        }
        let state = self
            .store
            .get_participation(activity_id, viewer_id)
            .await?
            .map(|p| p.state());
        Ok(ActivityView::new(activity, viewer_id, state))
    }

    /// Participants with their approval and check-in status, in subscription order.
    pub async fn list_participants(&self, activity_id: Uuid) -> Result<Vec<ParticipantView>> {
        self.load_activity(activity_id).await?;
        let participations = self
            .store
            .list_participations_for_activity(activity_id)
            .await?;

        let store = &self.store;
        let participants: Vec<Option<ParticipantView>> = stream::iter(participations)
            .map(|p| async move {
                let user = store.get_user(p.user_id).await?;
                Ok::<_, AppError>(user.filter(|u| u.is_active()).map(|u| ParticipantView {
                    user_id: u.id,
                    name: u.name,
                    avatar_url: u.avatar_url,
                    approved: p.approved,
                    confirmed_at: p.confirmed_at,
                    state: p.state(),
                }))
            })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .try_collect()
            .await?;

        Ok(participants.into_iter().flatten().collect())
    }

    // ─── Activity Lifecycle ──────────────────────────────────

    pub async fn create(&self, creator_id: Uuid, input: NewActivity) -> Result<Applied<ActivityView>> {
        self.ensure_type_exists(input.type_id).await?;
        let address = require_address(input.address)?;
        self.ensure_title_available(&input.title, None).await?;

        let image = match &input.image {
            Some(image) => Some(self.uploader.upload_image(image).await?),
            None => None,
        };

        let activity = Activity {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            type_id: input.type_id,
            image,
            confirmation_code: self.codes.generate()?,
            scheduled_date: input.scheduled_date,
            created_at: Utc::now(),
            completed_at: None,
            deleted_at: None,
            private: input.private,
            creator_id,
            address,
        };
        self.store.insert_activity(&activity).await?;

        tracing::info!(
            activity_id = %activity.id,
            %creator_id,
            private = activity.private,
            "Activity created"
        );

        let created = self.store.count_activities_by_creator(creator_id).await?;
        let rewards = self
            .dispatcher
            .apply(participation::creation_effects(creator_id, created))
            .await?;

        Ok(Applied {
            value: ActivityView::new(activity, creator_id, None),
            rewards,
        })
    }

    pub async fn update(
        &self,
        caller_id: Uuid,
        activity_id: Uuid,
        changes: ActivityChanges,
    ) -> Result<ActivityView> {
        let mut activity = self.load_activity(activity_id).await?;
        participation::ensure_creator(&activity, caller_id)?;
        if !activity.is_open() {
            return Err(AppError::InvalidState(
                "Cannot update a deactivated or completed activity".to_string(),
            ));
        }

        if let Some(type_id) = changes.type_id {
            if type_id != activity.type_id {
                self.ensure_type_exists(type_id).await?;
                activity.type_id = type_id;
            }
        }
        if let Some(title) = changes.title {
            if title != activity.title {
                self.ensure_title_available(&title, Some(activity.id))
                    .await?;
                activity.title = title;
            }
        }
        if let Some(address) = changes.address {
            activity.address = require_address(Some(address))?;
        }
        if let Some(description) = changes.description {
            activity.description = description;
        }
        if let Some(scheduled_date) = changes.scheduled_date {
            activity.scheduled_date = scheduled_date;
        }
        if let Some(private) = changes.private {
            activity.private = private;
        }
        if let Some(image) = &changes.image {
            activity.image = Some(self.uploader.upload_image(image).await?);
        }

        self.store.update_activity(&activity).await?;
        tracing::info!(%activity_id, %caller_id, "Activity updated");

        Ok(ActivityView::new(activity, caller_id, None))
    }

    /// Soft delete.
    pub async fn delete(&self, caller_id: Uuid, activity_id: Uuid) -> Result<()> {
        let activity = self.load_activity(activity_id).await?;
        participation::ensure_creator(&activity, caller_id)?;

        if !self
            .store
            .mark_activity_deleted(activity_id, Utc::now())
            .await?
        {
            return Err(AppError::InvalidState(
                "Activity is already deleted".to_string(),
            ));
        }

        tracing::info!(%activity_id, %caller_id, "Activity deleted");
        Ok(())
    }

    /// Conclude the activity and reward the creator and checked-in participants.
    ///
    /// The completion marker is written first so a concurrent second request
    /// fails instead of rewarding twice.
    pub async fn complete(
        &self,
        caller_id: Uuid,
        activity_id: Uuid,
    ) -> Result<Applied<ActivityView>> {
        let mut activity = self.load_activity(activity_id).await?;
        participation::complete(&activity, caller_id)?;

        let now = Utc::now();
        if !self
            .store
            .mark_activity_completed(activity_id, now)
            .await?
        {
            return Err(AppError::InvalidState(
                "Activity is already completed".to_string(),
            ));
        }
        activity.completed_at = Some(now);

        let participations = self
            .store
            .list_participations_for_activity(activity_id)
            .await?;
        let outcome = participation::completion_effects(&activity, &participations);

        tracing::info!(
            %activity_id,
            %caller_id,
            checked_in = participations.iter().filter(|p| p.is_confirmed()).count(),
            "Activity completed"
        );

        let rewards = self.dispatcher.apply(outcome.effects).await?;

        Ok(Applied {
            value: ActivityView::new(activity, caller_id, None),
            rewards,
        })
    }

    // ─── Participation ───────────────────────────────────────

    pub async fn subscribe(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
    ) -> Result<Applied<ParticipationView>> {
        let activity = self.load_activity(activity_id).await?;
        let existing = self.store.get_participation(activity_id, user_id).await?;
        let subscription =
            participation::subscribe(&activity, user_id, existing.as_ref(), Utc::now())?;

        if !self.store.insert_participation(&subscription).await? {
            return Err(AppError::InvalidState(
                "You are already subscribed to this activity".to_string(),
            ));
        }

        tracing::info!(
            %activity_id,
            %user_id,
            state = ?subscription.state(),
            "Subscribed to activity"
        );

        let total = self.store.list_participations_for_user(user_id).await?.len();
        let rewards = self
            .dispatcher
            .apply(participation::subscription_effects(user_id, total))
            .await?;

        Ok(Applied {
            value: ParticipationView::from(&subscription),
            rewards,
        })
    }

    /// Creator approves (`true`) or rejects (`false`) a participant.
    pub async fn decide(
        &self,
        caller_id: Uuid,
        activity_id: Uuid,
        participant_id: Uuid,
        approved: bool,
    ) -> Result<Applied<ParticipationView>> {
        let activity = self.load_activity(activity_id).await?;
        participation::ensure_creator(&activity, caller_id)?;

        let participant = self.store.get_user(participant_id).await?;
        if !participant.is_some_and(|u| u.is_active()) {
            return Err(AppError::NotFound(format!(
                "Participant {} not found",
                participant_id
            )));
        }

        let existing = self
            .store
            .get_participation(activity_id, participant_id)
            .await?;
        let now = Utc::now();
        let decided = participation::decide(&activity, caller_id, existing.as_ref(), approved, now)?;
        // Refused if a check-in landed after the read above
        if !self
            .store
            .decide_participation(activity_id, participant_id, approved, now)
            .await?
        {
            return Err(AppError::InvalidState(
                "Cannot change the decision after the participant checked in".to_string(),
            ));
        }

        tracing::info!(%activity_id, %participant_id, approved, "Participation decided");

        let approvals = if approved {
            self.store.count_approvals_by_creator(caller_id).await?
        } else {
            0
        };
        let rewards = self
            .dispatcher
            .apply(participation::decision_effects(caller_id, approved, approvals))
            .await?;

        Ok(Applied {
            value: ParticipationView::from(&decided),
            rewards,
        })
    }

    pub async fn check_in(
        &self,
        user_id: Uuid,
        activity_id: Uuid,
        confirmation_code: &str,
    ) -> Result<Applied<ParticipationView>> {
        let activity = self.load_activity(activity_id).await?;
        let existing = self.store.get_participation(activity_id, user_id).await?;
        let confirmed = participation::check_in(
            &activity,
            user_id,
            existing.as_ref(),
            confirmation_code,
            Utc::now(),
        )?;

        let Some(confirmed_at) = confirmed.confirmed_at else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "Check-in produced no confirmation time"
            )));
        };
        if !self
            .store
            .confirm_participation(activity_id, user_id, confirmed_at)
            .await?
        {
            return Err(AppError::InvalidState(
                "Check-in refused: already checked in or no longer approved".to_string(),
            ));
        }

        tracing::info!(%activity_id, %user_id, "Checked in");

        let check_ins = self
            .store
            .list_participations_for_user(user_id)
            .await?
            .iter()
            .filter(|p| p.is_confirmed())
            .count();
        let rewards = self
            .dispatcher
            .apply(participation::check_in_effects(
                user_id,
                activity.creator_id,
                check_ins,
            ))
            .await?;

        Ok(Applied {
            value: ParticipationView::from(&confirmed),
            rewards,
        })
    }

    pub async fn unsubscribe(&self, user_id: Uuid, activity_id: Uuid) -> Result<()> {
        self.load_activity(activity_id).await?;
        let existing = self.store.get_participation(activity_id, user_id).await?;
        participation::unsubscribe(existing.as_ref())?;

        if !self
            .store
            .delete_unconfirmed_participation(activity_id, user_id)
            .await?
        {
            return Err(AppError::InvalidState(
                "Cannot unsubscribe after checking in".to_string(),
            ));
        }
        tracing::info!(%activity_id, %user_id, "Unsubscribed from activity");
        Ok(())
    }
}

/// Both coordinates present, finite and in range.
fn require_address(input: Option<AddressInput>) -> Result<ActivityAddress> {
    let (Some(latitude), Some(longitude)) = input
        .map(|a| (a.latitude, a.longitude))
        .unwrap_or((None, None))
    else {
        return Err(AppError::BadRequest(
            "Address must include latitude and longitude".to_string(),
        ));
    };

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::BadRequest(
            "Address coordinates are out of range".to_string(),
        ));
    }

    Ok(ActivityAddress {
        latitude,
        longitude,
    })
}
