//! Download command implementation
//!
//! Fetches a single photo by ID and writes it to a file (named after the
//! photo by default) or to stdout.

use crate::adapters::supabase::SupabaseClient;
use crate::cli::{exit_code, exit_code_for};
use crate::config::load_config;
use crate::core::archive::names::sanitize;
use crate::core::download::PhotoDownloader;
use crate::domain::{PhotoId, PhotoRecord};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the download command
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Photo ID
    pub id: String,

    /// Output path, or `-` for stdout [default: the photo's display name]
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,
}

impl DownloadArgs {
    /// Execute the download command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };
        if let Err(e) = config.validate() {
            eprintln!("Configuration validation failed: {e}");
            return Ok(exit_code::CONFIGURATION);
        }

        let id = match PhotoId::new(self.id.as_str()) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Invalid photo id: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let client = Arc::new(SupabaseClient::new(&config.storage)?);
        let downloader =
            PhotoDownloader::new(client.clone(), client, config.export.read_timeout());

        let record = match downloader.locate(&id).await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Download failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };
        let display_name = record.display_name.clone();

        let result = match output_target(self.output.as_deref(), &record) {
            OutputTarget::Stdout => downloader.download_record(record, tokio::io::stdout()).await,
            OutputTarget::File(path) => {
                let file = tokio::fs::File::create(&path).await?;
                let result = downloader.download_record(record, file).await;
                match &result {
                    Ok(receipt) => eprintln!(
                        "Saved {display_name} ({} bytes) to {}",
                        receipt.size,
                        path.display()
                    ),
                    Err(_) => {
                        let _ = tokio::fs::remove_file(&path).await;
                    }
                }
                result
            }
        };

        match result {
            Ok(_) => Ok(exit_code::SUCCESS),
            Err(e) => {
                eprintln!("Download failed: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }
}

/// Where the downloaded bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Pick the destination for `record`
///
/// Only an explicit `-` means stdout. Without `--output` the file is named
/// after the photo, even when that name is itself `-`.
pub fn output_target(output: Option<&str>, record: &PhotoRecord) -> OutputTarget {
    match output {
        Some("-") => OutputTarget::Stdout,
        Some(path) => OutputTarget::File(PathBuf::from(path)),
        None => {
            let name = sanitize(&record.display_name).unwrap_or_else(|| record.id.to_string());
            OutputTarget::File(Path::new(".").join(name))
        }
    }
}
