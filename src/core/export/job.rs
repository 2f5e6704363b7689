//! Per-call export job state
//!
//! An [`ExportJob`] lives for one export call. It owns the requested IDs,
//! the current [`ExportPhase`] and exactly one result slot per requested ID.
//! Slots are write-once: recording a second result for the same ID is an
//! error, so a job can only complete when every ID has exactly one outcome.

use super::gauge::Payload;
use crate::domain::{BundleError, ObjectReadError, PhotoId, PhotoRecord, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle of an export job
///
/// ```text
/// Resolving -> Fetching -> Writing -> Finalizing -> Done
///     |            |          |           |
///     v            +----------+-----------+--> Aborted
///   Failed
/// ```
///
/// `Failed` is only reachable while resolving (catalog unavailable, nothing
/// found). Once records are resolved, per-photo problems degrade to partial
/// success; only a sink failure, a shutdown signal or the all-failed error
/// policy end the job early, in `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    Resolving,
    Fetching,
    Writing,
    Finalizing,
    Done,
    Failed,
    Aborted,
}

impl ExportPhase {
    /// Whether the job may move from `self` to `next`
    pub fn can_transition_to(&self, next: ExportPhase) -> bool {
        use ExportPhase::*;
        matches!(
            (self, next),
            (Resolving, Fetching)
                | (Resolving, Failed)
                | (Fetching, Writing)
                | (Writing, Finalizing)
                | (Finalizing, Done)
                | (Fetching, Aborted)
                | (Writing, Aborted)
                | (Finalizing, Aborted)
        )
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExportPhase::Done | ExportPhase::Failed | ExportPhase::Aborted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPhase::Resolving => "resolving",
            ExportPhase::Fetching => "fetching",
            ExportPhase::Writing => "writing",
            ExportPhase::Finalizing => "finalizing",
            ExportPhase::Done => "done",
            ExportPhase::Failed => "failed",
            ExportPhase::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a requested photo is missing from the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The catalog has no record for the ID
    NotInCatalog,
    /// The record exists but its object does not
    NotFound,
    /// The read exceeded its deadline
    Timeout,
    /// Transport or server failure
    Io,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NotInCatalog => "not_in_catalog",
            FailureReason::NotFound => "not_found",
            FailureReason::Timeout => "timeout",
            FailureReason::Io => "io",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed fetch with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl FetchFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn not_in_catalog() -> Self {
        Self::new(FailureReason::NotInCatalog, "no catalog record")
    }
}

impl From<ObjectReadError> for FetchFailure {
    fn from(err: ObjectReadError) -> Self {
        let reason = match &err {
            ObjectReadError::NotFound(_) => FailureReason::NotFound,
            ObjectReadError::Timeout(_) => FailureReason::Timeout,
            ObjectReadError::Io(_) => FailureReason::Io,
        };
        Self::new(reason, err.to_string())
    }
}

/// Outcome of reading one record's object
#[derive(Debug)]
pub enum FetchOutcome {
    Success(Payload),
    Failure(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// One record paired with its fetch outcome
#[derive(Debug)]
pub struct FetchResult {
    pub record: PhotoRecord,
    pub outcome: FetchOutcome,
}

/// Final state of one requested ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Written to the archive under this entry name
    Archived(String),
    Failed(FetchFailure),
}

/// Transient aggregate for one export call
#[derive(Debug)]
pub struct ExportJob {
    id: Uuid,
    requested_ids: Vec<PhotoId>,
    phase: ExportPhase,
    slots: HashMap<PhotoId, SlotOutcome>,
    completed_count: usize,
    failed_count: usize,
}

impl ExportJob {
    /// Create a job for `ids`; duplicates collapse to their first occurrence
    pub fn new(ids: &[PhotoId]) -> Self {
        let mut requested_ids: Vec<PhotoId> = Vec::with_capacity(ids.len());
        let mut seen = std::collections::HashSet::new();
        for id in ids {
            if seen.insert(id) {
                requested_ids.push(id.clone());
            }
        }

        Self {
            id: Uuid::new_v4(),
            requested_ids,
            phase: ExportPhase::Resolving,
            slots: HashMap::new(),
            completed_count: 0,
            failed_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requested IDs, deduplicated, in request order
    pub fn requested_ids(&self) -> &[PhotoId] {
        &self.requested_ids
    }

    pub fn phase(&self) -> ExportPhase {
        self.phase
    }

    /// Entries written to the archive so far
    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns `BundleError::Other` for a transition the lifecycle forbids.
    pub fn transition(&mut self, next: ExportPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(BundleError::Other(format!(
                "invalid export phase transition {} -> {}",
                self.phase, next
            )));
        }
        tracing::debug!(job_id = %self.id, from = %self.phase, to = %next, "Export phase change");
        self.phase = next;
        Ok(())
    }

    /// Record that `id` was written to the archive as `entry_name`
    pub fn record_archived(&mut self, id: &PhotoId, entry_name: impl Into<String>) -> Result<()> {
        self.fill_slot(id, SlotOutcome::Archived(entry_name.into()))?;
        self.completed_count += 1;
        Ok(())
    }

    /// Record that `id` could not be archived
    pub fn record_failure(&mut self, id: &PhotoId, failure: FetchFailure) -> Result<()> {
        self.fill_slot(id, SlotOutcome::Failed(failure))?;
        self.failed_count += 1;
        Ok(())
    }

    fn fill_slot(&mut self, id: &PhotoId, outcome: SlotOutcome) -> Result<()> {
        if !self.requested_ids.contains(id) {
            return Err(BundleError::Other(format!(
                "result for photo {id} which was not requested"
            )));
        }
        if self.slots.contains_key(id) {
            return Err(BundleError::Other(format!(
                "duplicate result for photo {id}"
            )));
        }
        self.slots.insert(id.clone(), outcome);
        Ok(())
    }

    /// Outcome recorded for `id`, if any
    pub fn outcome(&self, id: &PhotoId) -> Option<&SlotOutcome> {
        self.slots.get(id)
    }

    /// Whether every requested ID has its result
    pub fn is_complete(&self) -> bool {
        self.requested_ids.iter().all(|id| self.slots.contains_key(id))
    }

    /// Requested IDs that have no result yet
    pub fn unsettled_ids(&self) -> Vec<PhotoId> {
        self.requested_ids
            .iter()
            .filter(|id| !self.slots.contains_key(*id))
            .cloned()
            .collect()
    }

    /// Failures in request order
    pub fn failures(&self) -> Vec<(PhotoId, FetchFailure)> {
        self.requested_ids
            .iter()
            .filter_map(|id| match self.slots.get(id) {
                Some(SlotOutcome::Failed(failure)) => Some((id.clone(), failure.clone())),
                _ => None,
            })
            .collect()
    }
}
