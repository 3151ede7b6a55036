// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Participation state machine.
//!
//! ```text
//! NONE ──subscribe──▶ PENDING  (private activity)
//!      ──subscribe──▶ APPROVED (public activity)
//! PENDING ──decide──▶ APPROVED | REJECTED
//! APPROVED ──check-in──▶ CONFIRMED
//! any but CONFIRMED ──unsubscribe──▶ NONE
//! ```
//!
//! The functions here are pure: they validate a transition against the
//! loaded activity and participation and return the new record together
//! with the effects the transition earns. Loading, persisting and effect
//! dispatch happen in [`crate::services::activity`].

use crate::error::{AppError, Result};
use crate::models::achievement::{names, xp};
use crate::models::{Activity, Participation};
use crate::services::effects::{Effect, Outcome};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Subscriptions needed for the subscription achievement.
pub const SUBSCRIPTION_MILESTONE: usize = 10;
/// Confirmed check-ins needed for the frequent-participant achievement.
pub const CHECK_IN_MILESTONE: usize = 5;
/// Activities created needed for the creator achievement.
pub const CREATED_ACTIVITIES_MILESTONE: usize = 3;

fn ensure_open(activity: &Activity, action: &str) -> Result<()> {
    if activity.is_deleted() {
        return Err(AppError::InvalidState(format!(
            "Cannot {} a deactivated activity",
            action
        )));
    }
    if activity.is_completed() {
        return Err(AppError::InvalidState(format!(
            "Cannot {} a completed activity",
            action
        )));
    }
    Ok(())
}

/// Fails with `Forbidden` unless `user_id` created the activity.
pub fn ensure_creator(activity: &Activity, user_id: Uuid) -> Result<()> {
    if activity.creator_id != user_id {
        return Err(AppError::Forbidden(
            "Only the activity creator can do this".to_string(),
        ));
    }
    Ok(())
}

/// New participation for `user_id`. Public activities are approved at once.
pub fn subscribe(
    activity: &Activity,
    user_id: Uuid,
    existing: Option<&Participation>,
    now: DateTime<Utc>,
) -> Result<Participation> {
    ensure_open(activity, "subscribe to")?;

    if activity.creator_id == user_id {
        return Err(AppError::InvalidState(
            "The creator cannot subscribe to their own activity".to_string(),
        ));
    }

    if let Some(existing) = existing {
        if existing.is_confirmed() {
            return Err(AppError::InvalidState(
                "You have already checked in to this activity".to_string(),
            ));
        }
        return Err(AppError::InvalidState(
            "You are already subscribed to this activity".to_string(),
        ));
    }

    Ok(Participation {
        activity_id: activity.id,
        user_id,
        creator_id: activity.creator_id,
        approved: if activity.private { None } else { Some(true) },
        decided_at: None,
        confirmed_at: None,
        subscribed_at: now,
    })
}

/// Effects earned by a subscription, given the user's subscription count
/// including the new one.
pub fn subscription_effects(user_id: Uuid, total_subscriptions: usize) -> Vec<Effect> {
    if total_subscriptions == SUBSCRIPTION_MILESTONE {
        vec![Effect::grant(
            user_id,
            names::TEN_SUBSCRIPTIONS,
            xp::TEN_SUBSCRIPTIONS,
        )]
    } else {
        vec![]
    }
}

/// Creator approves or rejects a subscription.
///
/// The caller must already have checked that the participant exists as a user.
pub fn decide(
    activity: &Activity,
    caller_id: Uuid,
    existing: Option<&Participation>,
    approved: bool,
    now: DateTime<Utc>,
) -> Result<Participation> {
    ensure_creator(activity, caller_id)?;

    let existing = existing.ok_or_else(|| {
        AppError::NotFound("This user is not subscribed to the activity".to_string())
    })?;

    if existing.is_confirmed() {
        return Err(AppError::InvalidState(
            "Cannot change the decision after the participant checked in".to_string(),
        ));
    }

    Ok(Participation {
        approved: Some(approved),
        decided_at: Some(now),
        ..existing.clone()
    })
}

/// Effects earned by a decision, given the creator's explicit approval count
/// including this one.
pub fn decision_effects(creator_id: Uuid, approved: bool, total_approvals: usize) -> Vec<Effect> {
    if approved && total_approvals == 1 {
        vec![Effect::grant(
            creator_id,
            names::FIRST_APPROVAL,
            xp::FIRST_APPROVAL,
        )]
    } else {
        vec![]
    }
}

/// Participant confirms presence with the activity's code.
pub fn check_in(
    activity: &Activity,
    user_id: Uuid,
    existing: Option<&Participation>,
    confirmation_code: &str,
    now: DateTime<Utc>,
) -> Result<Participation> {
    ensure_open(activity, "check in to")?;

    if activity.creator_id == user_id {
        return Err(AppError::InvalidState(
            "The creator cannot check in to their own activity".to_string(),
        ));
    }

    let existing = existing.ok_or_else(|| {
        AppError::InvalidState("You are not subscribed to this activity".to_string())
    })?;

    if existing.is_confirmed() {
        return Err(AppError::InvalidState(
            "You have already checked in to this activity".to_string(),
        ));
    }

    if activity.private && existing.approved.is_none() {
        return Err(AppError::Forbidden(
            "Your subscription is still pending approval".to_string(),
        ));
    }

    if existing.approved == Some(false) {
        return Err(AppError::Forbidden(
            "Your subscription was rejected".to_string(),
        ));
    }

    if activity.confirmation_code != confirmation_code {
        return Err(AppError::BadRequest(
            "Invalid confirmation code".to_string(),
        ));
    }

    Ok(Participation {
        confirmed_at: Some(now),
        ..existing.clone()
    })
}

/// Effects earned by a check-in, given the participant's confirmed check-in
/// count including this one.
pub fn check_in_effects(
    participant_id: Uuid,
    creator_id: Uuid,
    total_check_ins: usize,
) -> Vec<Effect> {
    let mut effects = vec![Effect::grant(
        participant_id,
        names::FIRST_CHECK_IN,
        xp::FIRST_CHECK_IN,
    )];
    if total_check_ins == CHECK_IN_MILESTONE {
        effects.push(Effect::grant(
            participant_id,
            names::FREQUENT_PARTICIPANT,
            xp::FREQUENT_PARTICIPANT,
        ));
    }
    effects.push(Effect::award(participant_id, xp::CHECK_IN_PARTICIPANT));
    effects.push(Effect::award(creator_id, xp::CHECK_IN_CREATOR));
    effects
}

/// Participant leaves before checking in.
pub fn unsubscribe(existing: Option<&Participation>) -> Result<()> {
    let existing = existing.ok_or_else(|| {
        AppError::InvalidState("You are not subscribed to this activity".to_string())
    })?;

    if existing.is_confirmed() {
        return Err(AppError::InvalidState(
            "Cannot unsubscribe after checking in".to_string(),
        ));
    }

    Ok(())
}

/// Creator concludes the activity.
pub fn complete(activity: &Activity, caller_id: Uuid) -> Result<()> {
    ensure_creator(activity, caller_id)?;

    if activity.is_completed() {
        return Err(AppError::InvalidState(
            "Activity is already completed".to_string(),
        ));
    }
    if activity.is_deleted() {
        return Err(AppError::InvalidState(
            "Cannot complete a deactivated activity".to_string(),
        ));
    }

    Ok(())
}

/// Effects earned by concluding: the creator's achievement and XP, then XP
/// for every participant who checked in.
pub fn completion_effects(activity: &Activity, participations: &[Participation]) -> Outcome<()> {
    let mut effects = vec![
        Effect::grant(
            activity.creator_id,
            names::ACTIVITY_CONCLUDED,
            xp::ACTIVITY_CONCLUDED,
        ),
        Effect::award(activity.creator_id, xp::CONCLUDE_CREATOR),
    ];
    effects.extend(
        participations
            .iter()
            .filter(|p| p.is_confirmed())
            .map(|p| Effect::award(p.user_id, xp::CONCLUDE_PARTICIPANT)),
    );
    Outcome::new((), effects)
}

/// Effects earned by creating an activity, given the creator's activity
/// count including the new one.
pub fn creation_effects(creator_id: Uuid, total_created: usize) -> Vec<Effect> {
    let mut effects = vec![Effect::grant(
        creator_id,
        names::FIRST_ACTIVITY,
        xp::FIRST_ACTIVITY,
    )];
    if total_created == CREATED_ACTIVITIES_MILESTONE {
        effects.push(Effect::grant(
            creator_id,
            names::ACTIVITY_CREATOR,
            xp::ACTIVITY_CREATOR,
        ));
    }
    effects
}
