// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partiu API Server
//!
//! Activities, participation and gamification for people looking for
//! company in sports and social activities.

use partiu::{
    config::{Config, StoreBackend},
    db::{seed_reference_data, FirestoreDb, MemoryStore, Store},
    services::{DisabledImageUploader, HttpImageUploader, ImageUploader},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        "Starting Partiu API"
    );

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Achievement catalog and default activity types
    seed_reference_data(store.as_ref()).await?;

    let uploader: Arc<dyn ImageUploader> =
        match (&config.upload_url, &config.public_image_base_url) {
            (Some(upload_url), Some(public_base_url)) => {
                tracing::info!(upload_url = %upload_url, "Image uploads enabled");
                Arc::new(HttpImageUploader::new(
                    upload_url.clone(),
                    public_base_url.clone(),
                ))
            }
            _ => {
                tracing::warn!("UPLOAD_URL not configured; image uploads are disabled");
                Arc::new(DisabledImageUploader)
            }
        };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store, uploader));

    // Build router
    let app = partiu::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("partiu=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
