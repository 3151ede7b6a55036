//! Application configuration loaded from environment variables.
//!
//! Secrets (the JWT signing key) are injected as environment variables by
//! the deployment and read once at startup.

use std::env;

/// Which `Store` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store, seeded with reference data. Local development and tests.
    Memory,
    /// Google Cloud Firestore (or the emulator when FIRESTORE_EMULATOR_HOST is set).
    Firestore,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "firestore" => Ok(StoreBackend::Firestore),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Storage backend
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore backend only)
    pub gcp_project_id: String,
    /// Object storage endpoint that accepts `PUT {upload_url}/{object}`
    pub upload_url: Option<String>,
    /// Public base URL under which uploaded objects are served
    pub public_image_base_url: Option<String>,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Config for tests: in-memory store, no object storage.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            upload_url: None,
            public_image_base_url: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::Memory,
        };

        let gcp_project_id = match store_backend {
            StoreBackend::Firestore => {
                env::var("GCP_PROJECT_ID").map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?
            }
            StoreBackend::Memory => {
                env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string())
            }
        };

        let upload_url = non_empty_var("UPLOAD_URL");
        let public_image_base_url = non_empty_var("PUBLIC_IMAGE_BASE_URL");
        if upload_url.is_some() && public_image_base_url.is_none() {
            return Err(ConfigError::Missing("PUBLIC_IMAGE_BASE_URL"));
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            store_backend,
            gcp_project_id,
            upload_url,
            public_image_base_url,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
