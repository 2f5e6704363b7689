//! Core business logic for photobundle.
//!
//! # Modules
//!
//! - [`export`] - Bulk export: resolve, fetch concurrently, stream one archive
//! - [`archive`] - Streaming ZIP writer and the reader used to verify it
//! - [`download`] - Single-photo download
//! - [`response`] - Content type and attachment name for downloads
//!
//! # Export Workflow
//!
//! 1. **Resolve**: look the requested IDs up in the catalog
//! 2. **Fetch**: read the objects with bounded concurrency, one deadline per read
//! 3. **Write**: append every successful payload to the archive, in request order
//! 4. **Finalize**: write the central directory and report the summary
//!
//! # Example
//!
//! ```rust,no_run
//! use photobundle::config::load_config;
//! use photobundle::core::export::ExportOrchestrator;
//! use photobundle::domain::PhotoId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("photobundle.toml")?;
//! let orchestrator = ExportOrchestrator::from_config(&config)?;
//!
//! let ids = PhotoId::parse_list("12,13,14")?;
//! let file = tokio::fs::File::create("photos.zip").await?;
//! let summary = orchestrator.export(&ids, file).await?;
//!
//! println!("Archived: {}", summary.succeeded_count);
//! println!("Failed: {:?}", summary.failed_ids());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod download;
pub mod export;
pub mod response;
