// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Participation of a user in an activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One record per (activity, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub activity_id: Uuid,
    pub user_id: Uuid,
    /// Creator of the activity, denormalized for approval counts
    pub creator_id: Uuid,
    /// `Some(true)` approved, `Some(false)` rejected, `None` pending
    pub approved: Option<bool>,
    /// When the creator explicitly approved or rejected
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
    /// Set exactly once at check-in
    pub confirmed_at: Option<DateTime<Utc>>,
    pub subscribed_at: DateTime<Utc>,
}

/// Derived state of a participation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationState {
    Pending,
    Approved,
    Rejected,
    Confirmed,
}

impl Participation {
    /// Document ID; the composite key that makes subscriptions unique.
    pub fn key(activity_id: Uuid, user_id: Uuid) -> String {
        format!("{}_{}", activity_id, user_id)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub fn state(&self) -> ParticipationState {
        if self.is_confirmed() {
            return ParticipationState::Confirmed;
        }
        match self.approved {
            Some(true) => ParticipationState::Approved,
            Some(false) => ParticipationState::Rejected,
            None => ParticipationState::Pending,
        }
    }
}
