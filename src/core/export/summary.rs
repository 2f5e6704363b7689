//! Export summary and failure manifest
//!
//! The summary is what an export call returns: how many photos were
//! archived, which requested IDs failed and why. It serializes to JSON so
//! it can accompany a partial archive as its manifest.

use super::job::FailureReason;
use crate::config::FetchStrategy;
use crate::core::archive::EntryReceipt;
use crate::domain::{PhotoId, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One photo written to the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedEntry {
    pub photo_id: PhotoId,
    /// Entry name inside the archive, after sanitising and disambiguation
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    /// Hex SHA-256 of the uncompressed payload
    pub sha256: String,
}

impl ArchivedEntry {
    pub fn from_receipt(photo_id: PhotoId, receipt: EntryReceipt) -> Self {
        Self {
            photo_id,
            name: receipt.name,
            size: receipt.size,
            compressed_size: receipt.compressed_size,
            crc32: receipt.crc32,
            sha256: receipt.sha256,
        }
    }
}

/// One requested photo missing from the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPhoto {
    pub photo_id: PhotoId,
    pub reason: FailureReason,
    pub message: String,
}

/// Summary of an export operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub job_id: Uuid,

    pub strategy: FetchStrategy,

    /// Distinct IDs requested
    pub requested_count: usize,

    /// Photos written to the archive
    pub succeeded_count: usize,

    pub failed_count: usize,

    /// Archived entries in archive order
    pub entries: Vec<ArchivedEntry>,

    /// Failed IDs in request order
    pub failures: Vec<FailedPhoto>,

    /// Total bytes emitted to the sink, central directory included
    pub archive_bytes: u64,

    /// Highest number of fetched payloads held in memory at once
    pub peak_pending_payloads: usize,

    pub peak_pending_bytes: u64,

    #[serde(with = "duration_millis", rename = "duration_ms")]
    pub duration: Duration,
}

impl ExportSummary {
    /// Create an empty summary for a job
    pub fn new(job_id: Uuid, strategy: FetchStrategy, requested_count: usize) -> Self {
        Self {
            job_id,
            strategy,
            requested_count,
            succeeded_count: 0,
            failed_count: 0,
            entries: Vec::new(),
            failures: Vec::new(),
            archive_bytes: 0,
            peak_pending_payloads: 0,
            peak_pending_bytes: 0,
            duration: Duration::from_secs(0),
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn add_entry(&mut self, entry: ArchivedEntry) {
        self.entries.push(entry);
        self.succeeded_count += 1;
    }

    pub fn add_failure(&mut self, failure: FailedPhoto) {
        self.failures.push(failure);
        self.failed_count += 1;
    }

    /// IDs that are not in the archive, in request order
    pub fn failed_ids(&self) -> Vec<PhotoId> {
        self.failures.iter().map(|f| f.photo_id.clone()).collect()
    }

    /// Check if every requested photo was archived
    pub fn is_successful(&self) -> bool {
        self.failed_count == 0
    }

    /// Whether an archive was produced but some photos are missing from it
    pub fn is_partial(&self) -> bool {
        self.succeeded_count > 0 && self.failed_count > 0
    }

    /// Get success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.requested_count == 0 {
            return 100.0;
        }
        (self.succeeded_count as f64 / self.requested_count as f64) * 100.0
    }

    /// Pretty JSON manifest
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            job_id = %self.job_id,
            strategy = %self.strategy,
            requested = self.requested_count,
            succeeded = self.succeeded_count,
            failed = self.failed_count,
            archive_bytes = self.archive_bytes,
            peak_pending_payloads = self.peak_pending_payloads,
            duration_ms = self.duration.as_millis() as u64,
            success_rate = format!("{:.2}%", self.success_rate()),
            "Export summary"
        );

        if !self.failures.is_empty() {
            tracing::warn!(
                failed_count = self.failures.len(),
                "Export completed with missing photos"
            );
            for failure in &self.failures {
                tracing::warn!(
                    photo_id = %failure.photo_id,
                    reason = %failure.reason,
                    message = %failure.message,
                    "Photo not archived"
                );
            }
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
