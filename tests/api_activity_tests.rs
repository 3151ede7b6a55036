// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP tests for activity and profile routes.

use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{any_type_id, body_json, create_test_app, create_user, json_request, token_for};

fn activity_body(title: &str, type_id: Uuid) -> Value {
    json!({
        "title": title,
        "description": "Corrida leve",
        "type_id": type_id,
        "scheduled_date": (Utc::now() + Duration::days(3)).to_rfc3339(),
        "private": false,
        "address": "{-23.5, -46.6}",
    })
}

#[tokio::test]
async fn test_activity_flow_over_http() {
    let (app, state) = create_test_app().await;
    let creator = create_user(state.store.as_ref(), "Ana").await;
    let participant = create_user(state.store.as_ref(), "Bruno").await;
    let type_id = any_type_id(state.store.as_ref()).await;
    let (creator_token, participant_token) = (token_for(creator.id), token_for(participant.id));

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/activities",
            &creator_token,
            Some(activity_body("Corrida", type_id)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let activity_id = created["id"].as_str().unwrap().to_string();
    let code = created["confirmation_code"].as_str().unwrap().to_string();
    assert_eq!(created["address"]["latitude"], -23.5);
    assert_eq!(
        created["rewards"]["achievements_granted"][0]["name"],
        "A Primeira de Muitas"
    );

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/activities/{}/subscribe", activity_id),
            &participant_token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["state"], "approved");

    // Participants do not see the code
    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/api/activities/{}", activity_id),
            &participant_token,
            None,
        ))
        .await
        .unwrap();
    let view = body_json(response).await;
    assert!(view["confirmation_code"].is_null());
    assert_eq!(view["viewer_state"], "approved");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/activities/{}/check-in", activity_id),
            &participant_token,
            Some(json!({ "confirmation_code": code })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/activities/{}/conclude", activity_id),
            &creator_token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/api/activities/{}/participants", activity_id),
            &creator_token,
            None,
        ))
        .await
        .unwrap();
    let participants = body_json(response).await;
    assert_eq!(participants[0]["name"], "Bruno");
    assert_eq!(participants[0]["state"], "confirmed");

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/users/me",
            &participant_token,
            None,
        ))
        .await
        .unwrap();
    let profile = body_json(response).await;
    assert_eq!(profile["xp"], 200);
    assert_eq!(profile["level"], 2);
    assert_eq!(profile["achievements"][0]["name"], "Primeiro Check-in");
}

#[tokio::test]
async fn test_error_status_codes() {
    let (app, state) = create_test_app().await;
    let creator = create_user(state.store.as_ref(), "Carla").await;
    let other = create_user(state.store.as_ref(), "Diego").await;
    let type_id = any_type_id(state.store.as_ref()).await;
    let token = token_for(creator.id);

    // Unknown activity type
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/activities",
            &token,
            Some(activity_body("Trilha", Uuid::new_v4())),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Address without longitude
    let mut body = activity_body("Trilha", type_id);
    body["address"] = json!("{-23.5}");
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/activities", &token, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Past date
    let mut body = activity_body("Trilha", type_id);
    body["scheduled_date"] = json!((Utc::now() - Duration::days(1)).to_rfc3339());
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/activities", &token, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Empty title
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/activities",
            &token,
            Some(activity_body("", type_id)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/activities",
            &token,
            Some(activity_body("Trilha", type_id)),
        ))
        .await
        .unwrap();
    let activity_id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Duplicate title
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/activities",
            &token,
            Some(activity_body("Trilha", type_id)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_state");

    // Not the creator
    let response = app
        .clone()
        .oneshot(json_request(
            Method::DELETE,
            &format!("/api/activities/{}", activity_id),
            &token_for(other.id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Unknown activity
    let response = app
        .clone()
        .oneshot(json_request(
            Method::DELETE,
            &format!("/api/activities/{}", Uuid::new_v4()),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            Method::DELETE,
            &format!("/api/activities/{}", activity_id),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_list_pagination_limits() {
    let (app, state) = create_test_app().await;
    let user = create_user(state.store.as_ref(), "Eva").await;
    let type_id = any_type_id(state.store.as_ref()).await;
    let token = token_for(user.id);

    for i in 0..3 {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/activities",
                &token,
                Some(activity_body(&format!("Pedal {}", i), type_id)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            "/api/activities?page=2&per_page=2",
            &token,
            None,
        ))
        .await
        .unwrap();
    let page = body_json(response).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["activities"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            "/api/activities?page=1&per_page=1000",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["per_page"], 100);

    for uri in ["/api/activities?page=0", "/api/activities?page=1&per_page=0"] {
        let response = app
            .clone()
            .oneshot(json_request(Method::GET, uri, &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_catalogs_and_preferences() {
    let (app, state) = create_test_app().await;
    let user = create_user(state.store.as_ref(), "Fabio").await;
    let token = token_for(user.id);

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/achievements", &token, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 10);

    let response = app
        .clone()
        .oneshot(json_request(Method::GET, "/api/activity-types", &token, None))
        .await
        .unwrap();
    let types = body_json(response).await;
    let type_id = types[0]["id"].clone();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/users/me/preferences",
            &token,
            Some(json!({ "type_ids": [type_id] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["preferred_type_ids"][0], type_id);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/users/me/preferences",
            &token,
            Some(json!({ "type_ids": [Uuid::new_v4()] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_upload() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    let (app, state) = create_test_app().await;
    let user = create_user(state.store.as_ref(), "Gabi").await;
    let token = token_for(user.id);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/users/me/avatar",
            &token,
            Some(json!({
                "image": { "content_type": "image/png", "data_base64": BASE64.encode(b"png") }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let avatar = body_json(response).await["avatar_url"].clone();
    assert!(avatar.as_str().unwrap().ends_with(".png"));

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/users/me/avatar",
            &token,
            Some(json!({
                "image": { "content_type": "text/plain", "data_base64": BASE64.encode(b"hi") }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_large_avatar_fits_body_limit() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

    let (app, state) = create_test_app().await;
    let user = create_user(state.store.as_ref(), "Helena").await;

    // Well above axum's default 2 MB body limit once encoded
    let image = vec![0u8; 3 * 1024 * 1024];
    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/users/me/avatar",
            &token_for(user.id),
            Some(json!({
                "image": { "content_type": "image/jpeg", "data_base64": BASE64.encode(&image) }
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let (app, state) = create_test_app().await;
    let user = create_user(state.store.as_ref(), "Igor").await;

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/nothing-here",
            &token_for(user.id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}
