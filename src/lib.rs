// Photobundle - Bulk photo archive export
// Copyright (c) 2025 Photobundle Contributors
// Licensed under the MIT License

//! # Photobundle - bulk photo archive export
//!
//! Photobundle takes a set of photo IDs, fetches the photos from a remote
//! object store in parallel and streams them into a single ZIP archive.
//! One missing or slow photo never sinks the rest: it is left out of the
//! archive and reported in the job summary.
//!
//! ## Architecture
//!
//! Photobundle follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Export pipeline, archive container, single downloads
//! - [`adapters`] - Catalog and object store integrations
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photobundle::config::load_config;
//! use photobundle::core::export::ExportOrchestrator;
//! use photobundle::domain::PhotoId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("photobundle.toml")?;
//!     let orchestrator = ExportOrchestrator::from_config(&config)?;
//!
//!     let ids = PhotoId::parse_list("101,102,103")?;
//!     let out = tokio::fs::File::create("photos.zip").await?;
//!     let summary = orchestrator.export(&ids, out).await?;
//!
//!     println!(
//!         "Archived {} photo(s), missing: {:?}",
//!         summary.succeeded_count,
//!         summary.failed_ids()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Partial failure
//!
//! Only three things end an export early:
//!
//! - the catalog cannot be queried ([`domain::BundleError::CatalogUnavailable`])
//! - none of the IDs exist ([`domain::BundleError::NoPhotosFound`]); the
//!   output is never touched
//! - the output fails mid-stream ([`domain::BundleError::SinkWrite`]); the
//!   remaining reads are cancelled
//!
//! Everything else (a missing object, a timed-out read, a transport error)
//! is scoped to one photo and recorded in the
//! [`core::export::ExportSummary`].
//!
//! ## Testing without a backend
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use photobundle::adapters::memory::{InMemoryCatalog, InMemoryObjectStore};
//! use photobundle::core::export::{ExportOrchestrator, ExportSettings};
//! use photobundle::domain::{PhotoId, PhotoRecord, StorageKey};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = StorageKey::new("events/cake.jpg")?;
//! let catalog = Arc::new(InMemoryCatalog::with_records([PhotoRecord::new(
//!     PhotoId::new("1")?,
//!     "cake.jpg",
//!     key.clone(),
//!     Utc::now(),
//! )]));
//! let store = Arc::new(InMemoryObjectStore::new());
//! store.put(key, b"jpeg".to_vec());
//!
//! let orchestrator = ExportOrchestrator::new(catalog, store, ExportSettings::default());
//! let mut archive = Vec::new();
//! let summary = orchestrator.export(&[PhotoId::new("1")?], &mut archive).await?;
//! assert_eq!(summary.succeeded_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
