//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the photobundle configuration file.

use crate::cli::exit_code;
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        match config.validate() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Configuration Summary:");
                println!("  Environment: {:?}", config.environment);
                println!("  Log Level: {}", config.application.log_level);
                println!("  Storage URL: {}", config.storage.base_url);
                println!("  Bucket: {}", config.storage.bucket);
                println!("  Catalog Table: {}", config.storage.table);
                println!("  Fetch Strategy: {}", config.export.strategy);
                println!("  Max Concurrency: {}", config.export.max_concurrency);
                println!("  Read Timeout: {}ms", config.export.read_timeout_ms);
                println!("  Compression Level: {}", config.export.compression_level);
                println!("  Read Retries: {}", config.export.max_retries);
                println!("  On All Failed: {:?}", config.export.on_all_failed);
                println!();
                Ok(exit_code::SUCCESS)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(exit_code::CONFIGURATION)
            }
        }
    }
}
