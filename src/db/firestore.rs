// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing [`Store`].
//!
//! Uniqueness of participations and user achievements comes from their
//! composite document IDs combined with create-only inserts. XP changes use
//! a server-side increment transform. Every other change to an existing
//! document is a field-masked write inside a transaction that read the
//! document first, so stale copies never overwrite concurrent updates.

use super::{collections, Store};
use crate::error::AppError;
use crate::models::{
    Achievement, Activity, ActivityType, Participation, User, UserAchievement, XpUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::FirestoreConsistencySelector;
use uuid::Uuid;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Fields an activity update may touch.
const EDITABLE_ACTIVITY_FIELDS: [&str; 7] = [
    "title",
    "description",
    "type_id",
    "image",
    "scheduled_date",
    "private",
    "address",
];

/// Attempts for a guarded transaction before giving up on contention.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Write chosen by a guarded transaction after reading the document.
enum GuardedWrite {
    Skip,
    Update(&'static [&'static str]),
    Delete,
}

fn db_err(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Errors Firestore marks as safe to retry, such as contention aborts.
fn is_retryable(e: &FirestoreError) -> bool {
    matches!(e, FirestoreError::DatabaseError(db) if db.retry_possible)
}

/// Set a once-only timestamp, skipping the write if it is already set.
fn set_marker(
    marker: &mut Option<DateTime<Utc>>,
    at: DateTime<Utc>,
    fields: &'static [&'static str],
) -> GuardedWrite {
    if marker.is_some() {
        return GuardedWrite::Skip;
    }
    *marker = Some(at);
    GuardedWrite::Update(fields)
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn set_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Create-only insert. Returns `false` if the document already exists.
    async fn create_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<bool, AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let result: Result<T, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Read one document through a transaction, let `decide` inspect it, then
    /// commit the chosen write.
    ///
    /// The read joins the transaction, so a concurrent commit to the same
    /// document aborts one side; aborted attempts are retried on fresh data.
    /// Returns `None` for a missing document and `Some(false)` when `decide`
    /// skips the write.
    async fn guarded_write<T, F>(
        &self,
        collection: &str,
        doc_id: &str,
        decide: F,
    ) -> Result<Option<bool>, AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
        F: Fn(&mut T) -> GuardedWrite + Send + Sync,
    {
        let client = self.get_client()?;
        let mut attempt = 1;

        loop {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            let reader = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );
            let current: Result<Option<T>, FirestoreError> = reader
                .fluent()
                .select()
                .by_id_in(collection)
                .obj()
                .one(doc_id)
                .await;

            let mut object = match current {
                Ok(Some(object)) => object,
                Ok(None) => {
                    let _ = transaction.rollback().await;
                    return Ok(None);
                }
                Err(e) => {
                    let _ = transaction.rollback().await;
                    if is_retryable(&e) && attempt < MAX_TRANSACTION_ATTEMPTS {
                        tracing::warn!(
                            collection,
                            doc_id,
                            attempt,
                            error = %e,
                            "Transactional read aborted, retrying"
                        );
                        attempt += 1;
                        continue;
                    }
                    return Err(AppError::Database(format!(
                        "Failed to read {}/{} in transaction: {}",
                        collection, doc_id, e
                    )));
                }
            };

            match decide(&mut object) {
                GuardedWrite::Skip => {
                    let _ = transaction.rollback().await;
                    return Ok(Some(false));
                }
                GuardedWrite::Update(fields) => {
                    client
                        .fluent()
                        .update()
                        .fields(fields)
                        .in_col(collection)
                        .document_id(doc_id)
                        .object(&object)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add update to transaction: {}",
                                e
                            ))
                        })?;
                }
                GuardedWrite::Delete => {
                    client
                        .fluent()
                        .delete()
                        .from(collection)
                        .document_id(doc_id)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            AppError::Database(format!(
                                "Failed to add deletion to transaction: {}",
                                e
                            ))
                        })?;
                }
            }

            match transaction.commit().await {
                Ok(_) => return Ok(Some(true)),
                Err(e) if is_retryable(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    tracing::warn!(
                        collection,
                        doc_id,
                        attempt,
                        error = %e,
                        "Transaction aborted, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "Commit on {}/{} failed: {}",
                        collection, doc_id, e
                    )))
                }
            }
        }
    }

    /// All documents of `collection` whose `field` equals `value`.
    async fn select_where<T>(
        &self,
        collection: &str,
        field: &str,
        value: String,
    ) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn select_all<T>(&self, collection: &str) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, &user_id.to_string()).await
    }

    async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set_doc(collections::USERS, &user.id.to_string(), user)
            .await
    }

    async fn increment_xp(&self, user_id: Uuid, amount: u64) -> Result<XpUpdate, AppError> {
        let client = self.get_client()?;
        let doc_id = user_id.to_string();

        // Reject unknown users before the transform, which would otherwise
        // create a bare document.
        let before: User = self
            .get_doc(collections::USERS, &doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&doc_id)
            .transforms(|t| t.fields([t.field("xp").increment(amount as i64)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add XP increment to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("XP increment commit failed: {}", e)))?;

        let after: User = self
            .get_doc(collections::USERS, &doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        tracing::debug!(%user_id, amount, xp = after.xp, "XP incremented");

        Ok(XpUpdate {
            xp: after.xp.max(before.xp.saturating_add(amount)),
            level: after.level,
        })
    }

    async fn raise_level(&self, user_id: Uuid, level: u32) -> Result<(), AppError> {
        self.guarded_write(collections::USERS, &user_id.to_string(), |u: &mut User| {
            if u.level >= level {
                return GuardedWrite::Skip;
            }
            u.level = level;
            GuardedWrite::Update(&["level"])
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        Ok(())
    }

    async fn set_preferences(&self, user_id: Uuid, type_ids: &[Uuid]) -> Result<(), AppError> {
        self.guarded_write(collections::USERS, &user_id.to_string(), |u: &mut User| {
            u.preferred_type_ids = type_ids.to_vec();
            GuardedWrite::Update(&["preferred_type_ids"])
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        Ok(())
    }

    async fn set_avatar_url(&self, user_id: Uuid, avatar_url: &str) -> Result<(), AppError> {
        self.guarded_write(collections::USERS, &user_id.to_string(), |u: &mut User| {
            u.avatar_url = Some(avatar_url.to_string());
            GuardedWrite::Update(&["avatar_url"])
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        Ok(())
    }

    async fn mark_user_deleted(
        &self,
        user_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.guarded_write(collections::USERS, &user_id.to_string(), |u: &mut User| {
            set_marker(&mut u.deleted_at, deleted_at, &["deleted_at"])
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    // ─── Activity Type Operations ────────────────────────────────

    async fn list_activity_types(&self) -> Result<Vec<ActivityType>, AppError> {
        let mut types: Vec<ActivityType> = self.select_all(collections::ACTIVITY_TYPES).await?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn get_activity_type(&self, type_id: Uuid) -> Result<Option<ActivityType>, AppError> {
        self.get_doc(collections::ACTIVITY_TYPES, &type_id.to_string())
            .await
    }

    async fn upsert_activity_type(&self, activity_type: &ActivityType) -> Result<(), AppError> {
        self.set_doc(
            collections::ACTIVITY_TYPES,
            &activity_type.id.to_string(),
            activity_type,
        )
        .await
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(&self, activity_id: Uuid) -> Result<Option<Activity>, AppError> {
        self.get_doc(collections::ACTIVITIES, &activity_id.to_string())
            .await
    }

    async fn find_active_activity_by_title(
        &self,
        title: &str,
    ) -> Result<Option<Activity>, AppError> {
        let matches: Vec<Activity> = self
            .select_where(collections::ACTIVITIES, "title", title.to_string())
            .await?;
        Ok(matches.into_iter().find(|a| !a.is_deleted()))
    }

    async fn list_active_activities(&self) -> Result<Vec<Activity>, AppError> {
        let activities: Vec<Activity> = self.select_all(collections::ACTIVITIES).await?;
        Ok(activities.into_iter().filter(|a| !a.is_deleted()).collect())
    }

    async fn count_activities_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError> {
        let activities: Vec<Activity> = self
            .select_where(collections::ACTIVITIES, "creator_id", creator_id.to_string())
            .await?;
        Ok(activities.len())
    }

    async fn insert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let created = self
            .create_doc(collections::ACTIVITIES, &activity.id.to_string(), activity)
            .await?;
        if !created {
            return Err(AppError::Database(format!(
                "Activity {} already exists",
                activity.id
            )));
        }
        Ok(())
    }

    async fn update_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: Activity = self
            .get_client()?
            .fluent()
            .update()
            .fields(EDITABLE_ACTIVITY_FIELDS)
            .in_col(collections::ACTIVITIES)
            .document_id(activity.id.to_string())
            .object(activity)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn mark_activity_deleted(
        &self,
        activity_id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.guarded_write(
            collections::ACTIVITIES,
            &activity_id.to_string(),
            |a: &mut Activity| set_marker(&mut a.deleted_at, deleted_at, &["deleted_at"]),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))
    }

    async fn mark_activity_completed(
        &self,
        activity_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.guarded_write(
            collections::ACTIVITIES,
            &activity_id.to_string(),
            |a: &mut Activity| set_marker(&mut a.completed_at, completed_at, &["completed_at"]),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))
    }

    // ─── Participation Operations ────────────────────────────────

    async fn get_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Participation>, AppError> {
        self.get_doc(
            collections::PARTICIPATIONS,
            &Participation::key(activity_id, user_id),
        )
        .await
    }

    async fn insert_participation(&self, participation: &Participation) -> Result<bool, AppError> {
        self.create_doc(
            collections::PARTICIPATIONS,
            &Participation::key(participation.activity_id, participation.user_id),
            participation,
        )
        .await
    }

    async fn decide_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        approved: bool,
        decided_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.guarded_write(
            collections::PARTICIPATIONS,
            &Participation::key(activity_id, user_id),
            |p: &mut Participation| {
                if p.is_confirmed() {
                    return GuardedWrite::Skip;
                }
                p.approved = Some(approved);
                p.decided_at = Some(decided_at);
                GuardedWrite::Update(&["approved", "decided_at"])
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Participation not found".to_string()))
    }

    async fn confirm_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.guarded_write(
            collections::PARTICIPATIONS,
            &Participation::key(activity_id, user_id),
            |p: &mut Participation| {
                if p.approved != Some(true) {
                    return GuardedWrite::Skip;
                }
                set_marker(&mut p.confirmed_at, confirmed_at, &["confirmed_at"])
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Participation not found".to_string()))
    }

    async fn delete_unconfirmed_participation(
        &self,
        activity_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        self.guarded_write(
            collections::PARTICIPATIONS,
            &Participation::key(activity_id, user_id),
            |p: &mut Participation| {
                if p.is_confirmed() {
                    GuardedWrite::Skip
                } else {
                    GuardedWrite::Delete
                }
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Participation not found".to_string()))
    }

    async fn list_participations_for_activity(
        &self,
        activity_id: Uuid,
    ) -> Result<Vec<Participation>, AppError> {
        let mut participations: Vec<Participation> = self
            .select_where(
                collections::PARTICIPATIONS,
                "activity_id",
                activity_id.to_string(),
            )
            .await?;
        participations.sort_by_key(|p| p.subscribed_at);
        Ok(participations)
    }

    async fn list_participations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Participation>, AppError> {
        self.select_where(collections::PARTICIPATIONS, "user_id", user_id.to_string())
            .await
    }

    async fn count_approvals_by_creator(&self, creator_id: Uuid) -> Result<usize, AppError> {
        let participations: Vec<Participation> = self
            .select_where(
                collections::PARTICIPATIONS,
                "creator_id",
                creator_id.to_string(),
            )
            .await?;
        Ok(participations
            .iter()
            .filter(|p| p.approved == Some(true) && p.decided_at.is_some())
            .count())
    }

    // ─── Achievement Operations ──────────────────────────────────

    async fn find_achievement_by_name(&self, name: &str) -> Result<Option<Achievement>, AppError> {
        let matches: Vec<Achievement> = self
            .select_where(collections::ACHIEVEMENTS, "name", name.to_string())
            .await?;
        Ok(matches.into_iter().next())
    }

    async fn list_achievements(&self) -> Result<Vec<Achievement>, AppError> {
        let mut achievements: Vec<Achievement> =
            self.select_all(collections::ACHIEVEMENTS).await?;
        achievements.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(achievements)
    }

    async fn upsert_achievement(&self, achievement: &Achievement) -> Result<(), AppError> {
        self.set_doc(
            collections::ACHIEVEMENTS,
            &achievement.id.to_string(),
            achievement,
        )
        .await
    }

    async fn insert_user_achievement(&self, grant: &UserAchievement) -> Result<bool, AppError> {
        self.create_doc(
            collections::USER_ACHIEVEMENTS,
            &UserAchievement::key(grant.user_id, grant.achievement_id),
            grant,
        )
        .await
    }

    async fn list_user_achievements(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserAchievement>, AppError> {
        let mut grants: Vec<UserAchievement> = self
            .select_where(collections::USER_ACHIEVEMENTS, "user_id", user_id.to_string())
            .await?;
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }
}
