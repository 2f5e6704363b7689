//! Export orchestrator - main entry point for a bulk export
//!
//! Resolves the requested IDs, fetches the objects concurrently and appends
//! every successful payload to one streamed archive.
//!
//! An export is split in two steps so that a caller can decide whether to
//! open its output before any work is committed:
//!
//! 1. [`ExportOrchestrator::prepare`] resolves IDs. Catalog failures and
//!    "nothing found" end the job here and no output is touched.
//! 2. [`PreparedExport::write_to`] fetches and writes. From here on only a
//!    sink failure, a shutdown signal or the all-failed `error` policy can
//!    abort; per-photo failures are recorded in the summary.

use super::fetch::FetchCoordinator;
use super::gauge::PayloadGauge;
use super::job::{ExportJob, ExportPhase, FetchFailure, FetchOutcome, FetchResult};
use super::retry::{self, RetryingReader};
use super::summary::{ArchivedEntry, ExportSummary, FailedPhoto};
use crate::adapters::supabase::SupabaseClient;
use crate::adapters::traits::{CatalogLookup, ObjectReader};
use crate::config::{AllFailedPolicy, BundleConfig, ExportConfig, FetchStrategy};
use crate::core::archive::{ArchiveWriter, EntryMeta};
use crate::domain::{BundleError, PhotoId, PhotoRecord, Result};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use uuid::Uuid;

/// Tunables of one export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub max_concurrency: usize,
    /// Deadline of a single read attempt
    pub read_timeout: Duration,
    pub strategy: FetchStrategy,
    pub compression_level: u32,
    pub on_all_failed: AllFailedPolicy,
    /// Retries of transient read failures; 0 disables the retry layer
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl ExportSettings {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            read_timeout: config.read_timeout(),
            strategy: config.strategy,
            compression_level: config.compression_level,
            on_all_failed: config.on_all_failed,
            max_retries: config.max_retries.min(u32::MAX as usize) as u32,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Deadline for one record, covering every retry attempt
    pub fn record_deadline(&self) -> Duration {
        if self.max_retries == 0 {
            self.read_timeout
        } else {
            retry::worst_case(self.read_timeout, self.max_retries, self.retry_backoff)
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// Runs exports against a catalog and an object store
pub struct ExportOrchestrator {
    catalog: Arc<dyn CatalogLookup>,
    reader: Arc<dyn ObjectReader>,
    settings: ExportSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ExportOrchestrator {
    /// Create an orchestrator; `reader` is wrapped in a [`RetryingReader`]
    /// when `settings.max_retries > 0`
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        reader: Arc<dyn ObjectReader>,
        settings: ExportSettings,
    ) -> Self {
        let reader: Arc<dyn ObjectReader> = if settings.max_retries > 0 {
            Arc::new(RetryingReader::new(
                reader,
                settings.max_retries,
                settings.retry_backoff,
                settings.read_timeout,
            ))
        } else {
            reader
        };

        Self {
            catalog,
            reader,
            settings,
            shutdown: None,
        }
    }

    /// Build an orchestrator over the managed backend described by `config`
    pub fn from_config(config: &BundleConfig) -> Result<Self> {
        let client = Arc::new(SupabaseClient::new(&config.storage)?);
        Ok(Self::new(
            client.clone(),
            client,
            ExportSettings::from_config(&config.export),
        ))
    }

    /// Abort exports when `signal` turns `true`
    pub fn with_shutdown(mut self, signal: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(signal);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Resolve and run an export into `sink`
    pub async fn export<W>(&self, ids: &[PhotoId], sink: W) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.prepare(ids).await?.write_to(sink).await
    }

    /// Resolve `ids` against the catalog
    ///
    /// # Errors
    ///
    /// - `Validation` when `ids` is empty
    /// - `CatalogUnavailable` when the catalog cannot be queried
    /// - `NoPhotosFound` when none of the IDs resolve
    pub async fn prepare(&self, ids: &[PhotoId]) -> Result<PreparedExport> {
        if ids.is_empty() {
            return Err(BundleError::Validation(
                "at least one photo id is required".to_string(),
            ));
        }

        let started = Instant::now();
        let mut job = ExportJob::new(ids);
        crate::log_export_start!(job.id(), job.requested_ids().len(), self.settings.strategy);

        let resolved = match self.catalog.resolve(job.requested_ids()).await {
            Ok(records) => records,
            Err(e) => {
                job.transition(ExportPhase::Failed)?;
                tracing::error!(job_id = %job.id(), error = %e, "Catalog lookup failed");
                return Err(e.into());
            }
        };

        let mut by_id: HashMap<PhotoId, PhotoRecord> = HashMap::with_capacity(resolved.len());
        for record in resolved {
            by_id.entry(record.id.clone()).or_insert(record);
        }

        let mut records = Vec::with_capacity(by_id.len());
        for id in job.requested_ids().to_vec() {
            match by_id.remove(&id) {
                Some(record) => records.push(record),
                None => {
                    let failure = FetchFailure::not_in_catalog();
                    crate::log_fetch_failure!(id, "-", failure.reason, failure.message);
                    job.record_failure(&id, failure)?;
                }
            }
        }

        if records.is_empty() {
            job.transition(ExportPhase::Failed)?;
            let requested = job.requested_ids().len();
            tracing::warn!(job_id = %job.id(), requested, "No requested photo is in the catalog");
            return Err(BundleError::NoPhotosFound { requested });
        }

        tracing::debug!(
            job_id = %job.id(),
            resolved = records.len(),
            unresolved = job.failed_count(),
            "Resolved photo records"
        );

        Ok(PreparedExport {
            job,
            records,
            reader: Arc::clone(&self.reader),
            settings: self.settings.clone(),
            shutdown: self.shutdown.clone(),
            started,
        })
    }
}

/// An export whose IDs are resolved and whose output is not yet opened
pub struct PreparedExport {
    job: ExportJob,
    records: Vec<PhotoRecord>,
    reader: Arc<dyn ObjectReader>,
    settings: ExportSettings,
    shutdown: Option<watch::Receiver<bool>>,
    started: Instant,
}

impl PreparedExport {
    pub fn job_id(&self) -> Uuid {
        self.job.id()
    }

    /// Resolved records in request order
    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    /// Requested IDs with no catalog record
    pub fn unresolved_count(&self) -> usize {
        self.job.failed_count()
    }

    /// Fetch every resolved record and stream the archive into `sink`
    ///
    /// Nothing is written to `sink` before the first photo is ready, so an
    /// export aborted before that leaves the sink untouched.
    ///
    /// # Errors
    ///
    /// - `SinkWrite` when the sink fails; remaining fetches are aborted and
    ///   the archive is left unfinished
    /// - `Interrupted` on shutdown
    /// - `AllDownloadsFailed` when nothing could be fetched and the policy
    ///   is `error`
    pub async fn write_to<W>(self, sink: W) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let PreparedExport {
            mut job,
            records,
            reader,
            settings,
            mut shutdown,
            started,
        } = self;

        job.transition(ExportPhase::Fetching)?;

        let gauge = PayloadGauge::new();
        let coordinator = FetchCoordinator::new(
            reader,
            settings.max_concurrency,
            settings.record_deadline(),
        )
        .with_gauge(gauge.clone());

        let mut summary =
            ExportSummary::new(job.id(), settings.strategy, job.requested_ids().len());
        let mut writer = ArchiveWriter::open(sink, settings.compression_level);

        match settings.strategy {
            FetchStrategy::Barrier => {
                let results = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => {
                        return Err(abort(&mut job, BundleError::Interrupted));
                    }
                    results = coordinator.fetch_all(records) => results,
                };
                job.transition(ExportPhase::Writing)?;

                let any_success = results.iter().any(|r| r.outcome.is_success());
                if !any_success && settings.on_all_failed == AllFailedPolicy::Error {
                    for result in results {
                        settle(&mut job, &mut writer, &mut summary, result).await?;
                    }
                    let failed = job.failed_count();
                    return Err(abort(&mut job, BundleError::AllDownloadsFailed { failed }));
                }

                for result in results {
                    if is_shutdown(&shutdown) {
                        return Err(abort(&mut job, BundleError::Interrupted));
                    }
                    if let Err(e) = settle(&mut job, &mut writer, &mut summary, result).await {
                        return Err(abort(&mut job, e));
                    }
                }
            }
            FetchStrategy::Windowed => {
                let mut results = coordinator.fetch_ordered(records);
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = shutdown_requested(&mut shutdown) => {
                            drop(results);
                            return Err(abort(&mut job, BundleError::Interrupted));
                        }
                        next = results.next() => next,
                    };
                    let Some(result) = next else { break };

                    if job.phase() == ExportPhase::Fetching {
                        job.transition(ExportPhase::Writing)?;
                    }
                    if let Err(e) = settle(&mut job, &mut writer, &mut summary, result).await {
                        drop(results);
                        return Err(abort(&mut job, e));
                    }
                }

                if job.phase() == ExportPhase::Fetching {
                    job.transition(ExportPhase::Writing)?;
                }
                if writer.entry_count() == 0 && settings.on_all_failed == AllFailedPolicy::Error {
                    let failed = job.failed_count();
                    return Err(abort(&mut job, BundleError::AllDownloadsFailed { failed }));
                }
            }
        }

        if !job.is_complete() {
            let unsettled = job.unsettled_ids().len();
            return Err(abort(
                &mut job,
                BundleError::Other(format!("{unsettled} photo(s) have no result")),
            ));
        }

        job.transition(ExportPhase::Finalizing)?;
        let stats = match writer.finalize().await {
            Ok(stats) => stats,
            Err(e) => return Err(abort(&mut job, e.into())),
        };
        job.transition(ExportPhase::Done)?;

        for (photo_id, failure) in job.failures() {
            summary.add_failure(FailedPhoto {
                photo_id,
                reason: failure.reason,
                message: failure.message,
            });
        }
        summary.archive_bytes = stats.bytes_written;
        summary.peak_pending_payloads = gauge.peak();
        summary.peak_pending_bytes = gauge.peak_bytes();
        let summary = summary.with_duration(started.elapsed());

        crate::log_export_complete!(
            job.id(),
            summary.succeeded_count,
            summary.failed_count,
            summary.duration
        );

        Ok(summary)
    }
}

/// Record one fetch result; successes are appended to the archive
async fn settle<W>(
    job: &mut ExportJob,
    writer: &mut ArchiveWriter<W>,
    summary: &mut ExportSummary,
    result: FetchResult,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let FetchResult { record, outcome } = result;

    match outcome {
        FetchOutcome::Success(payload) => {
            let meta = EntryMeta {
                name: &record.display_name,
                fallback: record.id.as_str(),
                modified: record.created_at,
            };
            let receipt = writer.append_entry(meta, payload.data().clone()).await?;
            drop(payload);

            job.record_archived(&record.id, receipt.name.clone())?;
            summary.add_entry(ArchivedEntry::from_receipt(record.id, receipt));
        }
        FetchOutcome::Failure(failure) => {
            crate::log_fetch_failure!(
                record.id,
                record.storage_key,
                failure.reason,
                failure.message
            );
            job.record_failure(&record.id, failure)?;
        }
    }

    Ok(())
}

/// Move the job to `Aborted` and hand back the error that caused it
fn abort(job: &mut ExportJob, err: BundleError) -> BundleError {
    let phase = job.phase();
    if let Err(e) = job.transition(ExportPhase::Aborted) {
        tracing::debug!(job_id = %job.id(), error = %e, "Abort from unexpected phase");
    }
    tracing::error!(
        job_id = %job.id(),
        phase = %phase,
        archived = job.completed_count(),
        failed = job.failed_count(),
        error = %err,
        "Export aborted"
    );
    err
}

fn is_shutdown(signal: &Option<watch::Receiver<bool>>) -> bool {
    signal.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once shutdown is signalled; never resolves without a signal
async fn shutdown_requested(signal: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = signal else {
        return std::future::pending().await;
    };
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryCatalog, InMemoryObjectStore};
    use crate::core::archive::read_archive;
    use crate::domain::StorageKey;
    use chrono::{TimeZone, Utc};

    fn id(raw: &str) -> PhotoId {
        PhotoId::new(raw).unwrap()
    }

    fn fixture(photos: &[(&str, &str)]) -> (Arc<InMemoryCatalog>, Arc<InMemoryObjectStore>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let store = Arc::new(InMemoryObjectStore::new());
        for (photo_id, name) in photos {
            let key = StorageKey::new(format!("uploads/{photo_id}")).unwrap();
            catalog.insert(PhotoRecord::new(
                id(photo_id),
                *name,
                key.clone(),
                Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            ));
            store.put(key, format!("bytes of {photo_id}").into_bytes());
        }
        (catalog, store)
    }

    fn settings(strategy: FetchStrategy) -> ExportSettings {
        ExportSettings {
            read_timeout: Duration::from_millis(200),
            strategy,
            ..ExportSettings::default()
        }
    }

    #[test]
    fn test_record_deadline_covers_retries() {
        let mut s = settings(FetchStrategy::Windowed);
        assert_eq!(s.record_deadline(), Duration::from_millis(200));

        s.max_retries = 2;
        s.retry_backoff = Duration::from_millis(10);
        assert_eq!(s.record_deadline(), Duration::from_millis(630));
    }

    #[test]
    fn test_settings_from_default_config() {
        let s = ExportSettings::default();
        assert_eq!(s.max_concurrency, 8);
        assert_eq!(s.read_timeout, Duration::from_secs(30));
        assert_eq!(s.strategy, FetchStrategy::Windowed);
        assert_eq!(s.on_all_failed, AllFailedPolicy::EmptyArchive);
    }

    #[tokio::test]
    async fn test_prepare_orders_records_by_request() {
        let (catalog, store) = fixture(&[("1", "a.jpg"), ("2", "b.jpg"), ("3", "c.jpg")]);
        let orchestrator =
            ExportOrchestrator::new(catalog, store, settings(FetchStrategy::Windowed));

        let prepared = orchestrator
            .prepare(&[id("3"), id("x"), id("1")])
            .await
            .unwrap();
        let ids: Vec<_> = prepared.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
        assert_eq!(prepared.unresolved_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let (catalog, store) = fixture(&[]);
        let orchestrator =
            ExportOrchestrator::new(catalog, store, settings(FetchStrategy::Windowed));
        assert!(matches!(
            orchestrator.prepare(&[]).await,
            Err(BundleError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unresolved_ids_are_reported_as_not_in_catalog() {
        let (catalog, store) = fixture(&[("1", "a.jpg")]);
        let orchestrator =
            ExportOrchestrator::new(catalog, store, settings(FetchStrategy::Barrier));

        let mut sink = Vec::new();
        let summary = orchestrator
            .export(&[id("1"), id("ghost")], &mut sink)
            .await
            .unwrap();

        assert_eq!(summary.succeeded_count, 1);
        assert_eq!(summary.failed_ids(), vec![id("ghost")]);
        assert_eq!(
            summary.failures[0].reason,
            crate::core::export::FailureReason::NotInCatalog
        );
        assert_eq!(read_archive(&sink).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_before_write_leaves_sink_untouched() {
        let (catalog, store) = fixture(&[("1", "a.jpg")]);
        let (tx, rx) = watch::channel(false);
        let orchestrator =
            ExportOrchestrator::new(catalog, store, settings(FetchStrategy::Windowed))
                .with_shutdown(rx);

        let prepared = orchestrator.prepare(&[id("1")]).await.unwrap();
        tx.send(true).unwrap();

        let mut sink = Vec::new();
        let result = prepared.write_to(&mut sink).await;
        assert!(matches!(result, Err(BundleError::Interrupted)));
        assert!(sink.is_empty());
    }
}
