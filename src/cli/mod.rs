//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for photobundle using clap.

pub mod commands;

use crate::config::{BundleConfig, LoggingConfig};
use crate::domain::BundleError;
use clap::{Parser, Subcommand};

/// Exit codes shared by every command
pub mod exit_code {
    /// Everything requested was done
    pub const SUCCESS: i32 = 0;
    /// Archive produced, some photos missing
    pub const PARTIAL: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    /// No photos resolved, or every download failed
    pub const NOTHING_EXPORTED: i32 = 3;
    pub const CATALOG_UNAVAILABLE: i32 = 4;
    pub const FATAL: i32 = 5;
    /// Stopped by SIGINT/SIGTERM
    pub const INTERRUPTED: i32 = 130;
}

/// Map a job error to the process exit code
pub fn exit_code_for(err: &BundleError) -> i32 {
    match err {
        BundleError::Configuration(_) | BundleError::Validation(_) => exit_code::CONFIGURATION,
        BundleError::NoPhotosFound { .. }
        | BundleError::AllDownloadsFailed { .. }
        | BundleError::NotFound(_) => exit_code::NOTHING_EXPORTED,
        BundleError::CatalogUnavailable(_) => exit_code::CATALOG_UNAVAILABLE,
        BundleError::Interrupted => exit_code::INTERRUPTED,
        _ => exit_code::FATAL,
    }
}

/// Resolve the log level and log sinks for a run
///
/// `--log-level` wins over `application.log_level`. Without a loadable
/// config file logging stays console-only at `info`.
pub fn logging_settings(
    cli_level: Option<&str>,
    config: Option<&BundleConfig>,
) -> (String, LoggingConfig) {
    let level = cli_level
        .map(str::to_string)
        .or_else(|| config.map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let logging = config.map(|c| c.logging.clone()).unwrap_or_default();
    (level, logging)
}

/// photobundle - bulk photo archive export
#[derive(Parser, Debug)]
#[command(name = "photobundle")]
#[command(version, about, long_about = None)]
#[command(author = "Photobundle Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "photobundle.toml", env = "PHOTOBUNDLE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "PHOTOBUNDLE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export photos into a single ZIP archive
    Export(commands::export::ExportArgs),

    /// Download a single photo
    Download(commands::download::DownloadArgs),

    /// List gallery photos, newest first
    List(commands::list::ListArgs),

    /// Check that a ZIP archive is readable and its checksums match
    Verify(commands::verify::VerifyArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
