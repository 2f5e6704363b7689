//! Bulk export pipeline
//!
//! - [`orchestrator`] - resolve, fetch and write one archive per call
//! - [`fetch`] - concurrent, bounded object reads with per-read deadlines
//! - [`retry`] - optional retry layer for transient read failures
//! - [`job`] - per-call job state with write-once result slots
//! - [`gauge`] - accounting of fetched payloads held in memory
//! - [`summary`] - job summary and failure manifest

pub mod fetch;
pub mod gauge;
pub mod job;
pub mod orchestrator;
pub mod retry;
pub mod summary;

pub use crate::config::{AllFailedPolicy, FetchStrategy};
pub use fetch::FetchCoordinator;
pub use gauge::{Payload, PayloadGauge};
pub use job::{
    ExportJob, ExportPhase, FailureReason, FetchFailure, FetchOutcome, FetchResult, SlotOutcome,
};
pub use orchestrator::{ExportOrchestrator, ExportSettings, PreparedExport};
pub use retry::RetryingReader;
pub use summary::{ArchivedEntry, ExportSummary, FailedPhoto};
