//! Export command implementation
//!
//! This module implements the `export` command: resolve the requested photo
//! IDs, fetch them and write one ZIP archive to a file or to stdout.
//!
//! Human-readable output goes to stderr so `--output -` can stream the
//! archive on stdout.

use crate::cli::{exit_code, exit_code_for};
use crate::config::{load_config, AllFailedPolicy, FetchStrategy};
use crate::core::export::{ExportOrchestrator, ExportSummary};
use crate::core::response::ResponseMetadata;
use crate::domain::{BundleError, PhotoId};
use chrono::Utc;
use clap::Args;
use tokio::io::{AsyncWrite, BufWriter};
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Photo IDs to export (comma or whitespace separated)
    #[arg(long, required_unless_present = "ids_file", conflicts_with = "ids_file")]
    pub ids: Option<String>,

    /// File containing photo IDs, one per line or comma separated
    #[arg(long, value_name = "FILE")]
    pub ids_file: Option<String>,

    /// Archive path, or `-` for stdout [default: <prefix>_<timestamp>.zip]
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Write the JSON summary (failure manifest) to this path
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<String>,

    /// Override the fetch strategy (windowed or barrier)
    #[arg(long)]
    pub strategy: Option<FetchStrategy>,

    /// Override the maximum number of simultaneous reads
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Fail instead of writing an empty archive when every download fails
    #[arg(long)]
    pub fail_on_empty: bool,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        // Apply CLI overrides
        if let Some(strategy) = self.strategy {
            tracing::info!(strategy = %strategy, "Overriding fetch strategy from CLI");
            config.export.strategy = strategy;
        }
        if let Some(concurrency) = self.concurrency {
            tracing::info!(concurrency, "Overriding max concurrency from CLI");
            config.export.max_concurrency = concurrency;
        }
        if self.fail_on_empty {
            config.export.on_all_failed = AllFailedPolicy::Error;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(exit_code::CONFIGURATION);
        }

        let ids = match self.read_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                eprintln!("{e}");
                return Ok(exit_code_for(&e));
            }
        };

        let orchestrator = match ExportOrchestrator::from_config(&config) {
            Ok(o) => o.with_shutdown(shutdown_signal),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export orchestrator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        // Resolve before touching the output so a failed lookup leaves no file behind
        let prepared = match orchestrator.prepare(&ids).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Export failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let target = self.output.clone().unwrap_or_else(|| {
            ResponseMetadata::for_archive(&config.export.archive_name_prefix, Utc::now()).filename
        });
        let sink = match open_sink(&target).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open output {target}: {e}");
                return Ok(exit_code::FATAL);
            }
        };

        eprintln!(
            "Exporting {} photo(s) to {} ({} strategy)",
            prepared.records().len(),
            display_target(&target),
            config.export.strategy
        );

        let summary = match prepared.write_to(sink).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Export failed: {e}");
                discard_partial(&target).await;
                return Ok(exit_code_for(&e));
            }
        };

        summary.log_summary();
        print_summary(&summary);

        if let Some(path) = &self.manifest {
            let json = summary.to_json()?;
            tokio::fs::write(path, json).await?;
            eprintln!("Manifest written to {path}");
        }

        Ok(summary_exit_code(&summary))
    }

    /// Collect the requested IDs from `--ids` or `--ids-file`
    async fn read_ids(&self) -> Result<Vec<PhotoId>, BundleError> {
        let raw = match (&self.ids, &self.ids_file) {
            (Some(ids), _) => ids.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path).await.map_err(|e| {
                BundleError::Validation(format!("Failed to read ids file {path}: {e}"))
            })?,
            (None, None) => String::new(),
        };

        let ids = PhotoId::parse_list(&raw).map_err(BundleError::Validation)?;
        if ids.is_empty() {
            return Err(BundleError::Validation(
                "at least one photo id is required".to_string(),
            ));
        }
        Ok(ids)
    }
}

async fn open_sink(target: &str) -> std::io::Result<Box<dyn AsyncWrite + Unpin + Send>> {
    if target == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = tokio::fs::File::create(target).await?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Remove an unfinished archive file; stdout cannot be taken back
async fn discard_partial(target: &str) {
    if target == "-" {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(target).await {
        tracing::warn!(path = %target, error = %e, "Failed to remove partial archive");
    }
}

fn display_target(target: &str) -> &str {
    if target == "-" {
        "stdout"
    } else {
        target
    }
}

fn summary_exit_code(summary: &ExportSummary) -> i32 {
    if summary.succeeded_count == 0 {
        exit_code::NOTHING_EXPORTED
    } else if summary.is_successful() {
        exit_code::SUCCESS
    } else {
        exit_code::PARTIAL
    }
}

fn print_summary(summary: &ExportSummary) {
    eprintln!();
    eprintln!("Export Summary:");
    eprintln!("  Job: {}", summary.job_id);
    eprintln!("  Requested: {}", summary.requested_count);
    eprintln!("  Archived: {}", summary.succeeded_count);
    eprintln!("  Failed: {}", summary.failed_count);
    eprintln!("  Archive Size: {} bytes", summary.archive_bytes);
    eprintln!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    eprintln!("  Success Rate: {:.2}%", summary.success_rate());

    if !summary.failures.is_empty() {
        eprintln!();
        eprintln!("Missing photos:");
        for (i, failure) in summary.failures.iter().enumerate() {
            if i < 10 {
                eprintln!("  - {} ({}): {}", failure.photo_id, failure.reason, failure.message);
            }
        }
        if summary.failures.len() > 10 {
            eprintln!("  ... and {} more", summary.failures.len() - 10);
        }
    }
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::core::export::FailedPhoto;
    use crate::core::export::FailureReason;
    use clap::Parser;
    use std::io::Write;
    use uuid::Uuid;

    fn parse(args: &[&str]) -> ExportArgs {
        let mut full = vec!["photobundle", "export"];
        full.extend_from_slice(args);
        match Cli::parse_from(full).command {
            Commands::Export(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_export_args_overrides() {
        let args = parse(&[
            "--ids",
            "1,2",
            "--strategy",
            "barrier",
            "--concurrency",
            "4",
            "--fail-on-empty",
            "-o",
            "-",
        ]);
        assert_eq!(args.ids.as_deref(), Some("1,2"));
        assert_eq!(args.strategy, Some(FetchStrategy::Barrier));
        assert_eq!(args.concurrency, Some(4));
        assert!(args.fail_on_empty);
        assert_eq!(args.output.as_deref(), Some("-"));
    }

    #[test]
    fn test_ids_and_ids_file_conflict() {
        let result = Cli::try_parse_from([
            "photobundle",
            "export",
            "--ids",
            "1",
            "--ids-file",
            "ids.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ids_are_required() {
        assert!(Cli::try_parse_from(["photobundle", "export"]).is_err());
    }

    #[tokio::test]
    async fn test_read_ids_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10\n11, 12\n\n13").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let args = parse(&["--ids-file", path.as_str()]);
        let ids = args.read_ids().await.unwrap();
        let ids: Vec<_> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["10", "11", "12", "13"]);
    }

    #[tokio::test]
    async fn test_read_ids_rejects_empty_list() {
        let args = parse(&["--ids", " , "]);
        assert!(matches!(
            args.read_ids().await,
            Err(BundleError::Validation(_))
        ));
    }

    #[test]
    fn test_summary_exit_codes() {
        let mut summary = ExportSummary::new(Uuid::nil(), FetchStrategy::Windowed, 2);
        assert_eq!(summary_exit_code(&summary), exit_code::NOTHING_EXPORTED);

        summary.succeeded_count = 2;
        assert_eq!(summary_exit_code(&summary), exit_code::SUCCESS);

        summary.add_failure(FailedPhoto {
            photo_id: PhotoId::new("9").unwrap(),
            reason: FailureReason::Io,
            message: "reset".to_string(),
        });
        assert_eq!(summary_exit_code(&summary), exit_code::PARTIAL);
    }
}
