// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use partiu::config::Config;
use partiu::db::{seed_reference_data, FirestoreDb, MemoryStore, Store};
use partiu::middleware::auth::create_jwt;
use partiu::models::User;
use partiu::routes::create_router;
use partiu::services::MockImageUploader;
use partiu::AppState;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Seeded in-memory store.
#[allow(dead_code)]
pub async fn test_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_reference_data(store.as_ref())
        .await
        .expect("Failed to seed reference data");
    store
}

/// Create a test app over a seeded in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let store: Arc<dyn Store> = test_store().await;
    let state = Arc::new(AppState::new(
        Config::test_default(),
        store,
        Arc::new(MockImageUploader),
    ));
    (create_router(state.clone()), state)
}

/// Insert an active user.
#[allow(dead_code)]
pub async fn create_user(store: &dyn Store, name: &str) -> User {
    let user = User::new(
        name,
        &format!("{}@example.com", name.to_lowercase()),
        &Uuid::new_v4().simple().to_string()[..11],
        "hash",
    );
    store.upsert_user(&user).await.expect("Failed to create user");
    user
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn token_for(user_id: Uuid) -> String {
    create_jwt(user_id, &Config::test_default().jwt_signing_key).expect("Failed to sign JWT")
}

/// ID of a seeded activity type.
#[allow(dead_code)]
pub async fn any_type_id(store: &dyn Store) -> Uuid {
    store
        .list_activity_types()
        .await
        .expect("Failed to list types")
        .first()
        .expect("No seeded activity types")
        .id
}

/// Build an authenticated JSON request.
#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
