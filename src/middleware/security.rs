// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response headers for a JSON API used by the web app and mobile clients.
//!
//! Nothing here renders HTML, so the policy forbids every kind of embedding
//! and subresource load. API responses carry per-user data (profiles,
//! confirmation codes, rewards) and must not be cached by intermediaries.

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Headers set on every response.
const API_HEADERS: [(HeaderName, &str); 4] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (header::REFERRER_POLICY, "no-referrer"),
];

/// Prefix of the authenticated, per-user routes.
const API_PREFIX: &str = "/api/";

pub async fn add_security_headers(req: Request, next: Next) -> Response {
    let per_user = req.uri().path().starts_with(API_PREFIX);
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in API_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if per_user && !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}
