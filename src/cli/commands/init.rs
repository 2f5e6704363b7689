//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use crate::cli::exit_code;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "photobundle.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing photobundle configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(exit_code::CONFIGURATION);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your project URL", self.output);
                println!("  2. Put SUPABASE_SERVICE_KEY in your environment or a .env file");
                println!("  3. Validate configuration: photobundle validate-config");
                println!("  4. Run export: photobundle export --ids 1,2,3");
                println!();
                Ok(exit_code::SUCCESS)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(exit_code::FATAL)
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# photobundle configuration

environment = "development"

[application]
log_level = "info"

[storage]
base_url = "https://your-project.supabase.co"
api_key = "${SUPABASE_SERVICE_KEY}"
bucket = "photos"
table = "photos"

[export]
max_concurrency = 8
read_timeout_ms = 30000
strategy = "windowed"
compression_level = 5
on_all_failed = "empty_archive"

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# photobundle configuration
#
# Every value can be overridden with PHOTOBUNDLE_<SECTION>_<KEY>, for example
# PHOTOBUNDLE_EXPORT_MAX_CONCURRENCY=16. ${VAR} references are substituted
# from the environment (and .env) before parsing.

# development | staging | production
# production requires an https storage URL
environment = "development"

[application]
# trace | debug | info | warn | error
log_level = "info"

[storage]
# Project URL; catalog queries go to /rest/v1, objects to /storage/v1
base_url = "https://your-project.supabase.co"
# Sent as both apikey and bearer token
api_key = "${SUPABASE_SERVICE_KEY}"
# Bucket holding the photo objects
bucket = "photos"
# Table with id, file_name, file_url and created_at columns
table = "photos"
# Whole-request timeout for catalog queries and object reads
timeout_seconds = 60
connect_timeout_seconds = 30

[storage.retry]
# Total attempts for catalog queries that fail with a connection or server
# error, the first one included
max_attempts = 3
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 2.0

[export]
# Simultaneous object reads (1-64)
max_concurrency = 8
# Deadline for a single object read
read_timeout_ms = 30000
# windowed: write photos as soon as they arrive, at most max_concurrency
#           payloads held in memory
# barrier:  download everything first, then write
strategy = "windowed"
# DEFLATE level 0-9; 0 stores photos uncompressed
compression_level = 5
# empty_archive: a job where every download failed still yields a valid,
#                empty archive
# error:         fail the job instead, without writing anything
on_all_failed = "empty_archive"
# Retries for timed-out or failed object reads (0-10); missing objects are
# never retried
max_retries = 0
retry_backoff_ms = 250
# Default archive name is <prefix>_<YYYY-MM-DDTHH-MM-SS>.zip
archive_name_prefix = "photos"

[logging]
# JSON log files in addition to console output
local_enabled = false
local_path = "logs"
# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundleConfig;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "photobundle.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "photobundle.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generated_configs_are_valid() {
        for content in [
            InitArgs::generate_minimal_config(),
            InitArgs::generate_config_with_examples(),
        ] {
            let config: BundleConfig = toml::from_str(&content).unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.export.max_concurrency, 8);
        }
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photobundle.toml");
        std::fs::write(&path, "existing").unwrap();

        let mut args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), exit_code::CONFIGURATION);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");

        args.force = true;
        assert_eq!(args.execute().await.unwrap(), exit_code::SUCCESS);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("[storage]"));
    }
}
