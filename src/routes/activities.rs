// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity and participation routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::ActivityType;
use crate::services::activity::{
    ActivityChanges, ActivityFilter, ActivityPage, ActivityView, AddressInput, Applied,
    NewActivity, ParticipantView, ParticipationView, SortOrder,
};
use crate::services::upload::ImageUpload;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Activity routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activity-types", get(list_types))
        .route("/api/activities", get(list_activities).post(create_activity))
        .route(
            "/api/activities/{id}",
            get(get_activity).put(update_activity).delete(delete_activity),
        )
        .route("/api/activities/{id}/participants", get(list_participants))
        .route("/api/activities/{id}/subscribe", post(subscribe))
        .route("/api/activities/{id}/unsubscribe", delete(unsubscribe))
        .route("/api/activities/{id}/approve", put(decide))
        .route("/api/activities/{id}/check-in", put(check_in))
        .route("/api/activities/{id}/conclude", put(conclude))
}

// ─── Request Parsing ─────────────────────────────────────────

/// Address as sent by clients: either `{"latitude": .., "longitude": ..}`
/// or a `"{lat, lng}"` string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressField {
    Coordinates(AddressInput),
    Text(String),
}

impl AddressField {
    fn parse(self) -> Result<AddressInput> {
        match self {
            AddressField::Coordinates(input) => Ok(input),
            AddressField::Text(text) => parse_address(&text),
        }
    }
}

/// Parse `"{-23.5, -46.6}"` (braces optional). Missing parts stay `None`.
fn parse_address(text: &str) -> Result<AddressInput> {
    let inner = text.trim().trim_start_matches('{').trim_end_matches('}');
    let mut parts = inner.split(',').map(str::trim);

    let mut coordinate = || -> Result<Option<f64>> {
        match parts.next() {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
                AppError::BadRequest(format!("Invalid coordinate in address: {}", raw))
            }),
        }
    };
    let latitude = coordinate()?;
    let longitude = coordinate()?;

    if parts.next().is_some() {
        return Err(AppError::BadRequest(
            "Address must be '{latitude, longitude}'".to_string(),
        ));
    }

    Ok(AddressInput {
        latitude,
        longitude,
    })
}

fn ensure_not_past(scheduled_date: DateTime<Utc>) -> Result<()> {
    if scheduled_date < Utc::now() {
        return Err(AppError::BadRequest(
            "Scheduled date must not be in the past".to_string(),
        ));
    }
    Ok(())
}

// ─── Activity Types ──────────────────────────────────────────

async fn list_types(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ActivityType>>> {
    Ok(Json(state.activities.list_types().await?))
}

// ─── Activities ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    type_id: Option<Uuid>,
    #[serde(default)]
    order_by: SortOrder,
    /// Pagination: page number (1-indexed)
    page: Option<u32>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    20
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ActivitiesQuery>,
) -> Result<Json<ActivityPage>> {
    let filter = ActivityFilter {
        type_id: query.type_id,
        order: query.order_by,
        page: query.page,
        per_page: query.per_page,
    };
    Ok(Json(
        state.activities.list_activities(user.user_id, &filter).await?,
    ))
}

#[derive(Deserialize, Validate)]
struct CreateActivityRequest {
    #[validate(length(min = 1, max = 120))]
    title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    description: String,
    type_id: Uuid,
    scheduled_date: DateTime<Utc>,
    #[serde(default)]
    private: bool,
    address: Option<AddressField>,
    image: Option<ImageUpload>,
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Applied<ActivityView>>)> {
    request.validate()?;
    ensure_not_past(request.scheduled_date)?;

    let input = NewActivity {
        title: request.title.trim().to_string(),
        description: request.description,
        type_id: request.type_id,
        scheduled_date: request.scheduled_date,
        private: request.private,
        address: request.address.map(AddressField::parse).transpose()?,
        image: request.image,
    };

    let created = state.activities.create(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<ActivityView>> {
    Ok(Json(
        state
            .activities
            .get_activity(user.user_id, activity_id)
            .await?,
    ))
}

#[derive(Deserialize, Validate)]
struct UpdateActivityRequest {
    #[validate(length(min = 1, max = 120))]
    title: Option<String>,
    #[validate(length(max = 2000))]
    description: Option<String>,
    type_id: Option<Uuid>,
    scheduled_date: Option<DateTime<Utc>>,
    private: Option<bool>,
    address: Option<AddressField>,
    image: Option<ImageUpload>,
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    Json(request): Json<UpdateActivityRequest>,
) -> Result<Json<ActivityView>> {
    request.validate()?;
    if let Some(scheduled_date) = request.scheduled_date {
        ensure_not_past(scheduled_date)?;
    }

    let changes = ActivityChanges {
        title: request.title.map(|t| t.trim().to_string()),
        description: request.description,
        type_id: request.type_id,
        scheduled_date: request.scheduled_date,
        private: request.private,
        address: request.address.map(AddressField::parse).transpose()?,
        image: request.image,
    };

    Ok(Json(
        state
            .activities
            .update(user.user_id, activity_id, changes)
            .await?,
    ))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.activities.delete(user.user_id, activity_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn conclude(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Applied<ActivityView>>> {
    Ok(Json(
        state.activities.complete(user.user_id, activity_id).await?,
    ))
}

// ─── Participation ───────────────────────────────────────────

async fn list_participants(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<Uuid>,
) -> Result<Json<Vec<ParticipantView>>> {
    Ok(Json(state.activities.list_participants(activity_id).await?))
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Applied<ParticipationView>>)> {
    let subscription = state
        .activities
        .subscribe(user.user_id, activity_id)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
) -> Result<StatusCode> {
    state
        .activities
        .unsubscribe(user.user_id, activity_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct DecisionRequest {
    participant_id: Uuid,
    approved: bool,
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<Applied<ParticipationView>>> {
    Ok(Json(
        state
            .activities
            .decide(
                user.user_id,
                activity_id,
                request.participant_id,
                request.approved,
            )
            .await?,
    ))
}

#[derive(Deserialize, Validate)]
struct CheckInRequest {
    #[validate(length(min = 1))]
    confirmation_code: String,
}

async fn check_in(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<Applied<ParticipationView>>> {
    request.validate()?;
    Ok(Json(
        state
            .activities
            .check_in(user.user_id, activity_id, &request.confirmation_code)
            .await?,
    ))
}
