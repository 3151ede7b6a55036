// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gamification side effects.
//!
//! State transitions never touch XP or achievements directly. They return an
//! [`Outcome`] carrying a list of [`Effect`]s and the [`EffectDispatcher`]
//! applies them in order. Applying an effect can produce follow-up effects
//! (level milestones, the meta-achievement); those run before the next
//! queued effect.

use crate::db::Store;
use crate::error::Result;
use crate::models::achievement::{names, xp, ACHIEVEMENT_KING_THRESHOLD};
use crate::models::UserAchievement;
use crate::services::progression::{calculate_level, milestones_reached};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// A gamification side effect requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Grant an achievement by name, awarding `xp` the first time only.
    GrantAchievement {
        user_id: Uuid,
        name: &'static str,
        xp: u64,
    },
    /// Add XP to a user unconditionally.
    AwardXp { user_id: Uuid, amount: u64 },
}

impl Effect {
    pub fn grant(user_id: Uuid, name: &'static str, xp: u64) -> Self {
        Effect::GrantAchievement { user_id, name, xp }
    }

    pub fn award(user_id: Uuid, amount: u64) -> Self {
        Effect::AwardXp { user_id, amount }
    }
}

/// Result of a state transition: the new value plus effects to apply.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Effect>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, effects: Vec<Effect>) -> Self {
        Self { value, effects }
    }
}

/// What a dispatch actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Rewards {
    pub xp_awarded: Vec<XpAward>,
    pub achievements_granted: Vec<GrantedAchievement>,
    pub level_ups: Vec<LevelUp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct XpAward {
    pub user_id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GrantedAchievement {
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LevelUp {
    pub user_id: Uuid,
    pub level: u32,
}

impl Rewards {
    /// Achievement names granted to `user_id`, in grant order.
    pub fn achievements_for(&self, user_id: Uuid) -> Vec<&str> {
        self.achievements_granted
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Total XP awarded to `user_id`.
    pub fn xp_for(&self, user_id: Uuid) -> u64 {
        self.xp_awarded
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| a.amount)
            .sum()
    }
}

/// The single place where XP and achievements are written.
#[derive(Clone)]
pub struct EffectDispatcher {
    store: Arc<dyn Store>,
}

impl EffectDispatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply effects in order.
    ///
    /// Stops at the first store failure; effects applied before it are kept.
    pub async fn apply(&self, effects: Vec<Effect>) -> Result<Rewards> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut rewards = Rewards::default();

        while let Some(effect) = queue.pop_front() {
            let follow_ups = match effect {
                Effect::GrantAchievement { user_id, name, xp } => {
                    self.grant_achievement(user_id, name, xp, &mut rewards)
                        .await?
                }
                Effect::AwardXp { user_id, amount } => {
                    self.add_xp_and_check_level(user_id, amount, &mut rewards)
                        .await?
                }
            };
            for follow_up in follow_ups.into_iter().rev() {
                queue.push_front(follow_up);
            }
        }

        Ok(rewards)
    }

    /// Grant `name` to `user_id` once.
    ///
    /// Unknown achievement names are a no-op. The grant record is inserted
    /// first so that a concurrent grant of the same achievement loses the
    /// insert and awards nothing.
    async fn grant_achievement(
        &self,
        user_id: Uuid,
        name: &'static str,
        xp: u64,
        rewards: &mut Rewards,
    ) -> Result<Vec<Effect>> {
        let Some(achievement) = self.store.find_achievement_by_name(name).await? else {
            tracing::debug!(%user_id, achievement = name, "Achievement not in catalog, skipping");
            return Ok(vec![]);
        };

        let grant = UserAchievement {
            user_id,
            achievement_id: achievement.id,
            achievement_name: achievement.name.clone(),
            granted_at: chrono::Utc::now(),
        };
        if !self.store.insert_user_achievement(&grant).await? {
            tracing::debug!(%user_id, achievement = name, "Achievement already granted");
            return Ok(vec![]);
        }

        tracing::info!(%user_id, achievement = name, xp, "Achievement granted");
        rewards.achievements_granted.push(GrantedAchievement {
            user_id,
            name: achievement.name,
        });

        let mut follow_ups = vec![Effect::award(user_id, xp)];

        if name != names::ACHIEVEMENT_KING {
            let held = self.store.list_user_achievements(user_id).await?.len();
            if held >= ACHIEVEMENT_KING_THRESHOLD {
                follow_ups.push(Effect::grant(
                    user_id,
                    names::ACHIEVEMENT_KING,
                    xp::ACHIEVEMENT_KING,
                ));
            }
        }

        Ok(follow_ups)
    }

    /// Atomically add XP, persist a level-up and queue milestone achievements.
    async fn add_xp_and_check_level(
        &self,
        user_id: Uuid,
        amount: u64,
        rewards: &mut Rewards,
    ) -> Result<Vec<Effect>> {
        let update = self.store.increment_xp(user_id, amount).await?;
        rewards.xp_awarded.push(XpAward { user_id, amount });

        let new_level = calculate_level(update.xp);
        if new_level <= update.level {
            return Ok(vec![]);
        }

        self.store.raise_level(user_id, new_level).await?;
        tracing::info!(
            %user_id,
            xp = update.xp,
            from = update.level,
            to = new_level,
            "Level up"
        );
        rewards.level_ups.push(LevelUp {
            user_id,
            level: new_level,
        });

        Ok(milestones_reached(update.level, new_level)
            .into_iter()
            .map(|(name, xp)| Effect::grant(user_id, name, xp))
            .collect())
    }
}
