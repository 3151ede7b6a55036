//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile as stored.
///
/// `xp` and `level` are only ever changed by the effect dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Brazilian taxpayer number, unique per user
    pub cpf: String,
    /// Opaque hash owned by the identity provider
    pub password_hash: String,
    /// Profile picture URL
    pub avatar_url: Option<String>,
    /// Experience points (never negative)
    #[serde(default)]
    pub xp: u64,
    /// Current level (starts at 1)
    #[serde(default = "default_level")]
    pub level: u32,
    /// Activity types this user wants to see first
    #[serde(default)]
    pub preferred_type_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker, set on deactivation
    pub deleted_at: Option<DateTime<Utc>>,
}

fn default_level() -> u32 {
    1
}

impl User {
    /// A fresh user with zero XP at level 1.
    pub fn new(name: &str, email: &str, cpf: &str, password_hash: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            cpf: cpf.to_string(),
            password_hash: password_hash.to_string(),
            avatar_url: None,
            xp: 0,
            level: 1,
            preferred_type_ids: Vec::new(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// XP/level pair returned by an atomic XP increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpUpdate {
    /// XP after the increment
    pub xp: u64,
    /// Level stored before any level-up caused by this increment
    pub level: u32,
}
