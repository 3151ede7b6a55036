// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile and achievement routes for the authenticated user.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::Achievement;
use crate::services::upload::ImageUpload;
use crate::services::users::UserProfile;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// User routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/me", get(get_me).delete(deactivate))
        .route("/api/users/me/preferences", put(set_preferences))
        .route("/api/users/me/avatar", put(update_avatar))
        .route("/api/achievements", get(list_achievements))
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.users.profile(user.user_id).await?))
}

#[derive(Deserialize, Validate)]
struct PreferencesRequest {
    #[validate(length(max = 50))]
    type_ids: Vec<Uuid>,
}

async fn set_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<PreferencesRequest>,
) -> Result<Json<UserProfile>> {
    request.validate()?;
    Ok(Json(
        state
            .users
            .set_preferences(user.user_id, request.type_ids)
            .await?,
    ))
}

#[derive(Deserialize)]
struct AvatarRequest {
    image: ImageUpload,
}

async fn update_avatar(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<AvatarRequest>,
) -> Result<Json<UserProfile>> {
    Ok(Json(
        state
            .users
            .update_avatar(user.user_id, &request.image)
            .await?,
    ))
}

/// Deactivate the account. The session stops working immediately.
async fn deactivate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    tracing::info!(user_id = %user.user_id, "User-initiated deactivation");
    state.users.deactivate(user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_achievements(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Achievement>>> {
    Ok(Json(state.users.list_achievements().await?))
}
