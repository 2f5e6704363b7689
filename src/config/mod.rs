//! Configuration management for photobundle.
//!
//! # Overview
//!
//! photobundle uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `PHOTOBUNDLE_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use photobundle::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("photobundle.toml")?;
//!
//! println!("Backend: {}", config.storage.base_url);
//! println!("Concurrency: {}", config.export.max_concurrency);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level)
//! - [`StorageConfig`] - Catalog and object storage backend
//! - [`ExportConfig`] - Concurrency, deadlines, compression, failure policy
//! - [`LoggingConfig`] - Local JSON file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [storage]
//! base_url = "https://project.supabase.co"
//! api_key = "${PHOTOBUNDLE_API_KEY}"
//! bucket = "photos"
//!
//! [export]
//! max_concurrency = 8
//! read_timeout_ms = 30000
//! strategy = "windowed"
//! on_all_failed = "empty_archive"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    AllFailedPolicy, ApplicationConfig, BundleConfig, Environment, ExportConfig, FetchStrategy,
    LoggingConfig, RetryConfig, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
