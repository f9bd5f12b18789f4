//! Configuration management
//!
//! This module handles loading and parsing configuration for YouthBridge.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables prefixed with `YOUTHBRIDGE_` (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Object storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Recommendation scoring weights
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    /// Outgoing mail (notifications are only logged when absent)
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (the dashboard, cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/youthbridge.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// In-memory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached recommendation and analytics results, in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cache_capacity() -> u64 {
    10_000
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_ttl_days")]
    pub ttl_days: i64,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    #[serde(default)]
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_session_ttl_days(),
            cookie_secure: false,
        }
    }
}

fn default_session_ttl_days() -> i64 {
    7
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 20MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_file_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

/// Object storage driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageDriver {
    /// Local filesystem (default)
    #[default]
    Local,
    /// S3-compatible object store (MinIO, AWS S3)
    S3,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub driver: StorageDriver,
    /// Root directory for the local driver
    #[serde(default = "default_storage_path")]
    pub local_path: PathBuf,
    /// URL prefix under which local files are served
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// S3 endpoint, e.g. `http://localhost:9000`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Lifetime of presigned download URLs
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            driver: StorageDriver::default(),
            local_path: default_storage_path(),
            public_base_url: default_public_base_url(),
            endpoint: None,
            bucket: None,
            region: default_region(),
            access_key: None,
            secret_key: None,
            presign_ttl_seconds: default_presign_ttl(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_base_url() -> String {
    "/files".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_ttl() -> u64 {
    3600
}

/// Weights for the recommendation score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_tag_weight")]
    pub tag_weight: f64,
    #[serde(default = "default_popularity_weight")]
    pub popularity_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Age at which the recency component halves
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default = "default_recommendation_limit")]
    pub default_limit: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            tag_weight: default_tag_weight(),
            popularity_weight: default_popularity_weight(),
            recency_weight: default_recency_weight(),
            half_life_days: default_half_life_days(),
            default_limit: default_recommendation_limit(),
        }
    }
}

fn default_tag_weight() -> f64 {
    3.0
}

fn default_popularity_weight() -> f64 {
    1.0
}

fn default_recency_weight() -> f64 {
    2.0
}

fn default_half_life_days() -> f64 {
    30.0
}

fn default_recommendation_limit() -> usize {
    10
}

/// SMTP settings for notification mail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender, e.g. `YouthBridge <no-reply@example.org>`
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate
    ///
    /// Environment variables follow the pattern `YOUTHBRIDGE_<SECTION>_<KEY>`:
    /// - YOUTHBRIDGE_SERVER_HOST / _PORT / _CORS_ORIGIN
    /// - YOUTHBRIDGE_DATABASE_DRIVER / _URL
    /// - YOUTHBRIDGE_SESSION_TTL_DAYS / _COOKIE_SECURE
    /// - YOUTHBRIDGE_STORAGE_DRIVER / _LOCAL_PATH / _ENDPOINT / _BUCKET /
    ///   _REGION / _ACCESS_KEY / _SECRET_KEY
    ///
    /// Unparseable values are ignored and the file value is kept.
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        override_string("YOUTHBRIDGE_SERVER_HOST", &mut self.server.host);
        override_parsed("YOUTHBRIDGE_SERVER_PORT", &mut self.server.port);
        override_string("YOUTHBRIDGE_SERVER_CORS_ORIGIN", &mut self.server.cors_origin);

        // Database
        if let Ok(driver) = std::env::var("YOUTHBRIDGE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        override_string("YOUTHBRIDGE_DATABASE_URL", &mut self.database.url);

        // Session
        override_parsed("YOUTHBRIDGE_SESSION_TTL_DAYS", &mut self.session.ttl_days);
        override_parsed("YOUTHBRIDGE_SESSION_COOKIE_SECURE", &mut self.session.cookie_secure);

        // Storage
        if let Ok(driver) = std::env::var("YOUTHBRIDGE_STORAGE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "local" => self.storage.driver = StorageDriver::Local,
                "s3" => self.storage.driver = StorageDriver::S3,
                _ => {}
            }
        }
        if let Ok(path) = std::env::var("YOUTHBRIDGE_STORAGE_LOCAL_PATH") {
            self.storage.local_path = PathBuf::from(path);
        }
        override_optional("YOUTHBRIDGE_STORAGE_ENDPOINT", &mut self.storage.endpoint);
        override_optional("YOUTHBRIDGE_STORAGE_BUCKET", &mut self.storage.bucket);
        override_string("YOUTHBRIDGE_STORAGE_REGION", &mut self.storage.region);
        override_optional("YOUTHBRIDGE_STORAGE_ACCESS_KEY", &mut self.storage.access_key);
        override_optional("YOUTHBRIDGE_STORAGE_SECRET_KEY", &mut self.storage.secret_key);
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.driver == StorageDriver::S3 {
            for (name, value) in [
                ("storage.endpoint", &self.storage.endpoint),
                ("storage.bucket", &self.storage.bucket),
                ("storage.access_key", &self.storage.access_key),
                ("storage.secret_key", &self.storage.secret_key),
            ] {
                if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                    return Err(ConfigError::ValidationError(format!(
                        "{} is required when storage.driver is s3",
                        name
                    )));
                }
            }
        }

        let rec = &self.recommendation;
        if rec.half_life_days <= 0.0 {
            return Err(ConfigError::ValidationError(
                "recommendation.half_life_days must be positive".to_string(),
            ));
        }
        if rec.tag_weight < 0.0 || rec.popularity_weight < 0.0 || rec.recency_weight < 0.0 {
            return Err(ConfigError::ValidationError(
                "recommendation weights must not be negative".to_string(),
            ));
        }
        if self.session.ttl_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_days must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        *target = value;
    }
}

fn override_optional(var: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(var) {
        *target = Some(value);
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse::<T>() {
            *target = parsed;
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "YOUTHBRIDGE_SERVER_HOST",
    "YOUTHBRIDGE_SERVER_PORT",
    "YOUTHBRIDGE_SERVER_CORS_ORIGIN",
    "YOUTHBRIDGE_DATABASE_DRIVER",
    "YOUTHBRIDGE_DATABASE_URL",
    "YOUTHBRIDGE_SESSION_TTL_DAYS",
    "YOUTHBRIDGE_SESSION_COOKIE_SECURE",
    "YOUTHBRIDGE_STORAGE_DRIVER",
    "YOUTHBRIDGE_STORAGE_LOCAL_PATH",
    "YOUTHBRIDGE_STORAGE_ENDPOINT",
    "YOUTHBRIDGE_STORAGE_BUCKET",
    "YOUTHBRIDGE_STORAGE_REGION",
    "YOUTHBRIDGE_STORAGE_ACCESS_KEY",
    "YOUTHBRIDGE_STORAGE_SECRET_KEY",
];

#[cfg(test)]
fn lock_clean_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
    guard
}


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Any valid port written to the file comes back unchanged
        #[test]
        fn port_roundtrip(port in 1u16..=65535) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", port).unwrap();
            let config = Config::load(file.path()).unwrap();
            prop_assert_eq!(config.server.port, port);
        }

        /// Serializing a config and loading it back preserves the weights
        #[test]
        fn weights_roundtrip(
            tag in 0.0f64..100.0,
            pop in 0.0f64..100.0,
            rec in 0.0f64..100.0,
            half_life in 0.1f64..365.0,
        ) {
            let mut config = Config::default();
            config.recommendation.tag_weight = tag;
            config.recommendation.popularity_weight = pop;
            config.recommendation.recency_weight = rec;
            config.recommendation.half_life_days = half_life;

            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();
            let loaded = Config::load(file.path()).unwrap();

            prop_assert_eq!(loaded.recommendation.tag_weight, tag);
            prop_assert_eq!(loaded.recommendation.popularity_weight, pop);
            prop_assert_eq!(loaded.recommendation.recency_weight, rec);
            prop_assert_eq!(loaded.recommendation.half_life_days, half_life);
            prop_assert!(loaded.validate().is_ok());
        }

        /// Environment overrides win over file values
        #[test]
        fn env_port_overrides_file(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = super::lock_clean_env();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", file_port).unwrap();

            std::env::set_var("YOUTHBRIDGE_SERVER_PORT", env_port.to_string());
            let config = Config::load_with_env(file.path()).unwrap();
            std::env::remove_var("YOUTHBRIDGE_SERVER_PORT");

            prop_assert_eq!(config.server.port, env_port);
        }
    }
}
