// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Static reference data describing a kind of activity (running, chess, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityType {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
}

/// Meeting point of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityAddress {
    pub latitude: f64,
    pub longitude: f64,
}

/// Stored activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID (also used as document ID)
    pub id: Uuid,
    /// Unique among non-deleted activities
    pub title: String,
    pub description: String,
    pub type_id: Uuid,
    pub image: Option<String>,
    /// Shared secret participants present at check-in; never changes
    pub confirmation_code: String,
    pub scheduled_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set once when the creator concludes the activity
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once when the creator deletes the activity
    pub deleted_at: Option<DateTime<Utc>>,
    /// Private activities require creator approval of each subscription
    pub private: bool,
    pub creator_id: Uuid,
    pub address: ActivityAddress,
}

impl Activity {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Neither deleted nor completed.
    pub fn is_open(&self) -> bool {
        !self.is_deleted() && !self.is_completed()
    }
}
