//! Configuration loading for the fanout publishing core.
//!
//! Loads `.env` files and environment variables prefixed with `FANOUT_`,
//! producing a typed [`AppConfig`]. Every remote API base URL is
//! overridable, which is also what lets the integration tests point
//! publishers at wiremock servers.

use std::env;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::CryptoKey;

const ENV_PREFIX: &str = "FANOUT_";

/// Application configuration derived from `FANOUT_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Base64-encoded 32-byte AES key for token encryption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<String>,

    // Outbound HTTP tunables.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// Extended timeout for large byte uploads (YouTube resumable PUT).
    #[serde(default = "default_upload_timeout_seconds")]
    pub upload_timeout_seconds: u64,

    // Refresh/verification cadence.
    #[serde(default = "default_token_refresh_lead_time_seconds")]
    pub token_refresh_lead_time_seconds: i64,
    #[serde(default = "default_verification_tick_interval_seconds")]
    pub verification_tick_interval_seconds: u64,
    #[serde(default = "default_verification_jitter_factor")]
    pub verification_jitter_factor: f64,

    // Container/media polling budgets.
    #[serde(default = "default_graph_poll_interval_seconds")]
    pub graph_poll_interval_seconds: u64,
    #[serde(default = "default_graph_poll_max_attempts")]
    pub graph_poll_max_attempts: u32,
    #[serde(default = "default_pinterest_poll_interval_seconds")]
    pub pinterest_poll_interval_seconds: u64,
    #[serde(default = "default_pinterest_poll_max_attempts")]
    pub pinterest_poll_max_attempts: u32,

    // X (Twitter).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_client_secret: Option<String>,
    #[serde(default = "default_x_api_base")]
    pub x_api_base: String,

    // Facebook / Instagram (Graph API).
    #[serde(default = "default_facebook_graph_base")]
    pub facebook_graph_base: String,
    #[serde(default = "default_facebook_graph_base")]
    pub instagram_graph_base: String,

    // LinkedIn (personal + page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_client_secret: Option<String>,
    #[serde(default = "default_linkedin_api_base")]
    pub linkedin_api_base: String,
    #[serde(default = "default_linkedin_oauth_base")]
    pub linkedin_oauth_base: String,
    #[serde(default = "default_linkedin_version")]
    pub linkedin_version: String,

    // TikTok.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok_client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok_client_secret: Option<String>,
    #[serde(default = "default_tiktok_api_base")]
    pub tiktok_api_base: String,

    // YouTube (Google OAuth).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_client_secret: Option<String>,
    #[serde(default = "default_youtube_api_base")]
    pub youtube_api_base: String,
    #[serde(default = "default_youtube_upload_base")]
    pub youtube_upload_base: String,
    #[serde(default = "default_google_oauth_base")]
    pub google_oauth_base: String,

    // Pinterest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinterest_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinterest_client_secret: Option<String>,
    #[serde(default = "default_pinterest_api_base")]
    pub pinterest_api_base: String,

    // Threads.
    #[serde(default = "default_threads_graph_base")]
    pub threads_graph_base: String,
}

fn default_profile() -> String {
    "local".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_database_url() -> String {
    "postgres://localhost/fanout".to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_http_timeout_seconds() -> u64 {
    30
}
fn default_upload_timeout_seconds() -> u64 {
    600
}
fn default_token_refresh_lead_time_seconds() -> i64 {
    300
}
fn default_verification_tick_interval_seconds() -> u64 {
    3600
}
fn default_verification_jitter_factor() -> f64 {
    0.1
}
fn default_graph_poll_interval_seconds() -> u64 {
    3
}
fn default_graph_poll_max_attempts() -> u32 {
    30
}
fn default_pinterest_poll_interval_seconds() -> u64 {
    5
}
fn default_pinterest_poll_max_attempts() -> u32 {
    30
}
fn default_x_api_base() -> String {
    "https://api.twitter.com".to_string()
}
fn default_facebook_graph_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}
fn default_linkedin_api_base() -> String {
    "https://api.linkedin.com".to_string()
}
fn default_linkedin_oauth_base() -> String {
    "https://www.linkedin.com".to_string()
}
fn default_linkedin_version() -> String {
    "202501".to_string()
}
fn default_tiktok_api_base() -> String {
    "https://open.tiktokapis.com".to_string()
}
fn default_youtube_api_base() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_youtube_upload_base() -> String {
    "https://www.googleapis.com".to_string()
}
fn default_google_oauth_base() -> String {
    "https://oauth2.googleapis.com".to_string()
}
fn default_pinterest_api_base() -> String {
    "https://api.pinterest.com".to_string()
}
fn default_threads_graph_base() -> String {
    "https://graph.threads.net".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        // An empty object deserializes purely from the serde defaults.
        serde_json::from_value(serde_json::Value::Object(Default::default()))
            .expect("default configuration is valid")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("crypto key is not configured")]
    MissingCryptoKey,
    #[error("crypto key is invalid: {0}")]
    InvalidCryptoKey(String),
}

impl AppConfig {
    /// Decode the configured base64 crypto key.
    pub fn crypto_key(&self) -> Result<CryptoKey, ConfigError> {
        let encoded = self
            .crypto_key
            .as_deref()
            .ok_or(ConfigError::MissingCryptoKey)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ConfigError::InvalidCryptoKey(e.to_string()))?;
        CryptoKey::new(bytes).map_err(|e| ConfigError::InvalidCryptoKey(e.to_string()))
    }
}

/// Loads [`AppConfig`] from layered `.env` files plus process environment.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // Missing .env files are fine; real deployments use the process
        // environment.
        let _ = dotenvy::dotenv();
        Self::from_env_map(env::vars())
    }

    /// Build the config from an explicit key/value iterator (tests).
    pub fn from_env_map<I>(vars: I) -> Result<AppConfig, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut object = serde_json::Map::new();
        for (key, value) in vars {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            object.insert(stripped.to_string(), coerce_env_value(stripped, &value));
        }

        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}*"),
                message: e.to_string(),
            }
        })
    }
}

/// Numeric fields arrive from the environment as strings; coerce only the
/// keys whose suffix marks them as numeric so string fields with digit-only
/// values (e.g. `LINKEDIN_VERSION`) stay strings.
fn coerce_env_value(key: &str, raw: &str) -> serde_json::Value {
    const NUMERIC_SUFFIXES: &[&str] = &[
        "_SECONDS",
        "_ATTEMPTS",
        "_CONNECTIONS",
        "_FACTOR",
    ];

    if NUMERIC_SUFFIXES.iter().any(|suffix| key.ends_with(suffix)) {
        if let Ok(int) = raw.parse::<i64>() {
            return serde_json::Value::from(int);
        }
        if let Ok(float) = raw.parse::<f64>() {
            return serde_json::Value::from(float);
        }
    }
    serde_json::Value::String(raw.to_string())
}
