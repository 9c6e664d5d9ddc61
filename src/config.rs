//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Minimum HS256 key length used by the auth service.
const MIN_SIGNING_KEY_LEN: usize = 32;

/// Where listings and preferences are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the auth microservice (token, validate, refresh, bot notify)
    pub auth_service_url: String,
    /// Base URL of the hh.ru API
    pub search_api_url: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    pub storage_backend: StorageBackend,
    /// GCP project ID (Firestore backend only)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// HS256 key shared with the auth service (raw bytes, at least 32)
    pub jwt_signing_key: Vec<u8>,

    /// Period of the auto-update sweep
    pub auto_update_interval: Duration,
    /// Period of the token-cache sweep
    pub token_sweep_interval: Duration,
    /// Max listings per outbound message
    pub notification_batch_size: usize,
    /// Upper bound on any single collaborator call
    pub collaborator_timeout: Duration,
    /// Users processed in parallel within one sweep
    pub sweep_concurrency: usize,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            auth_service_url: "http://localhost:8081".to_string(),
            search_api_url: "https://api.hh.ru".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            storage_backend: StorageBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            auto_update_interval: Duration::from_secs(60),
            token_sweep_interval: Duration::from_secs(300),
            notification_batch_size: 10,
            collaborator_timeout: Duration::from_secs(10),
            sweep_concurrency: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        let batch_size: usize = parse_or("NOTIFICATION_BATCH_SIZE", 10)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid(
                "NOTIFICATION_BATCH_SIZE",
                "0".to_string(),
            ));
        }

        Ok(Self {
            auth_service_url: env::var("AUTH_SERVICE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("AUTH_SERVICE_URL"))?,
            search_api_url: env::var("HH_API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.hh.ru".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            storage_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            jwt_signing_key: signing_key_bytes(
                env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            ),
            auto_update_interval: Duration::from_secs(parse_or("AUTO_UPDATE_INTERVAL_SECS", 60)?),
            token_sweep_interval: Duration::from_secs(parse_or("TOKEN_SWEEP_INTERVAL_SECS", 300)?),
            notification_batch_size: batch_size,
            collaborator_timeout: Duration::from_secs(parse_or("COLLABORATOR_TIMEOUT_SECS", 10)?),
            sweep_concurrency: parse_or::<usize>("SWEEP_CONCURRENCY", 4)?.max(1),
        })
    }
}

/// Keys shorter than 32 bytes are zero-padded, matching how the auth service
/// derives its HMAC key from the same secret.
pub fn signing_key_bytes(secret: String) -> Vec<u8> {
    let mut key = secret.into_bytes();
    if key.len() < MIN_SIGNING_KEY_LEN {
        key.resize(MIN_SIGNING_KEY_LEN, 0);
    }
    key
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, v.clone())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
