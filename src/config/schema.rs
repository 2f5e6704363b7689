//! Configuration schema types
//!
//! This module defines the configuration structure that maps to
//! `photobundle.toml`.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// How the fetch coordinator hands results to the archive writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Bounded in-flight window, results consumed in record order as soon
    /// as the head of the window completes
    #[default]
    Windowed,
    /// Join every read before the archive is opened
    Barrier,
}

impl std::fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStrategy::Windowed => write!(f, "windowed"),
            FetchStrategy::Barrier => write!(f, "barrier"),
        }
    }
}

impl std::str::FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windowed" => Ok(FetchStrategy::Windowed),
            "barrier" => Ok(FetchStrategy::Barrier),
            other => Err(format!(
                "Invalid fetch strategy '{other}'. Must be one of: windowed, barrier"
            )),
        }
    }
}

/// What an export does when every resolved photo failed to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllFailedPolicy {
    /// Emit a well-formed archive with no entries
    #[default]
    EmptyArchive,
    /// Fail with `AllDownloadsFailed` before anything is written
    Error,
}

/// Main photobundle configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Object storage and catalog backend
    pub storage: StorageConfig,

    /// Bulk export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BundleConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.storage.validate(&self.environment)?;
        self.export.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Retry configuration for backend requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per catalog query, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Backoff before the given retry (1-based), capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self
            .backoff_multiplier
            .powf(attempt.saturating_sub(1) as f64);
        let delay_ms = (self.initial_delay_ms as f64 * factor) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }

    fn validate(&self, section: &str) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err(format!("{section}.max_attempts must be >= 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "{section}.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }
}

/// Object storage and metadata catalog configuration
///
/// Both collaborators live behind the same managed backend: objects are
/// served from `{base_url}/storage/v1` and photo rows from
/// `{base_url}/rest/v1/{table}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the backend project
    pub base_url: String,

    /// API key sent as `apikey` and bearer token
    /// Stored securely in memory and automatically zeroized on drop
    pub api_key: SecretString,

    /// Storage bucket holding the photo objects
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Catalog table holding photo rows
    #[serde(default = "default_table")]
    pub table: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Retry policy for catalog queries
    #[serde(default)]
    pub retry: RetryConfig,
}

impl StorageConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_url.is_empty() {
            return Err("storage.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("storage.base_url must start with http:// or https://".to_string());
        }

        if *environment == Environment::Production && !self.base_url.starts_with("https://") {
            return Err(
                "storage.base_url must use https:// in production environments".to_string(),
            );
        }

        if self.api_key.expose_secret().is_empty() {
            return Err("storage.api_key cannot be empty".to_string());
        }

        if self.bucket.is_empty() || self.bucket.contains('/') {
            return Err(format!(
                "storage.bucket must be a single non-empty path segment, got '{}'",
                self.bucket
            ));
        }

        if self.table.is_empty() {
            return Err("storage.table cannot be empty".to_string());
        }

        if self.timeout_seconds == 0 {
            return Err("storage.timeout_seconds must be > 0".to_string());
        }

        self.retry.validate("storage.retry")?;
        Ok(())
    }
}

/// Bulk export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum simultaneous object reads
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for a single object read in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Fetch strategy (windowed or barrier)
    #[serde(default)]
    pub strategy: FetchStrategy,

    /// DEFLATE level 0-9; 0 stores entries uncompressed
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Behaviour when every resolved photo failed to download
    #[serde(default)]
    pub on_all_failed: AllFailedPolicy,

    /// Retries for transient object read failures (0 disables retrying)
    #[serde(default)]
    pub max_retries: usize,

    /// Initial backoff between read retries in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Prefix of the generated archive file name
    #[serde(default = "default_archive_name_prefix")]
    pub archive_name_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            read_timeout_ms: default_read_timeout_ms(),
            strategy: FetchStrategy::default(),
            compression_level: default_compression_level(),
            on_all_failed: AllFailedPolicy::default(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            archive_name_prefix: default_archive_name_prefix(),
        }
    }
}

impl ExportConfig {
    /// Per-read deadline as a Duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 || self.max_concurrency > 64 {
            return Err(format!(
                "export.max_concurrency must be between 1 and 64, got {}",
                self.max_concurrency
            ));
        }

        if self.read_timeout_ms == 0 {
            return Err("export.read_timeout_ms must be > 0".to_string());
        }

        if self.compression_level > 9 {
            return Err(format!(
                "export.compression_level must be between 0 and 9, got {}",
                self.compression_level
            ));
        }

        if self.max_retries > 10 {
            return Err(format!(
                "export.max_retries must be <= 10, got {}",
                self.max_retries
            ));
        }

        if self.archive_name_prefix.trim().is_empty() {
            return Err("export.archive_name_prefix cannot be empty".to_string());
        }

        if self
            .archive_name_prefix
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '"' || c.is_control())
        {
            return Err(format!(
                "export.archive_name_prefix contains invalid characters: '{}'",
                self.archive_name_prefix
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".into());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bucket() -> String {
    "photos".to_string()
}

fn default_table() -> String {
    "photos".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_concurrency() -> usize {
    8
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_compression_level() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_archive_name_prefix() -> String {
    "photos".to_string()
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
