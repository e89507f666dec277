//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. Only the JWT signing key is required;
//! the rest falls back to local-development defaults.

use std::env;
use std::path::PathBuf;

/// Default minimum interval between two remote schedule refreshes (10 minutes).
pub const DEFAULT_SCHEDULE_REFRESH_SECS: u64 = 10 * 60;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Origin of the app shell allowed by CORS
    pub frontend_url: String,
    /// GCP project ID hosting the Firestore database
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Directory holding the on-device schedule mirror
    pub cache_dir: PathBuf,
    /// Minimum seconds between two remote schedule refreshes
    pub schedule_refresh_secs: u64,
    /// Mail API endpoint for booking confirmations (disabled when unset)
    pub mail_api_url: Option<String>,
    /// Sender address used in confirmation mails
    pub mail_from: String,

    // --- Secrets ---
    /// Key used to verify session tokens issued by the auth provider (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Bearer key for the mail API
    pub mail_api_key: Option<String>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:8081".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            cache_dir: env::temp_dir().join("kanto-kittens-test"),
            schedule_refresh_secs: DEFAULT_SCHEDULE_REFRESH_SECS,
            mail_api_url: None,
            mail_from: "bookings@kanto-kittens.test".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            mail_api_key: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let schedule_refresh_secs = match env::var("SCHEDULE_REFRESH_SECS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("SCHEDULE_REFRESH_SECS", raw))?,
            Err(_) => DEFAULT_SCHEDULE_REFRESH_SECS,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8081".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".kanto-cache")),
            schedule_refresh_secs,
            mail_api_url: env::var("MAIL_API_URL")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "bookings@kanto-kittens.app".to_string()),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            mail_api_key: env::var("MAIL_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
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
