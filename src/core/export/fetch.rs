//! Concurrent fetch coordinator
//!
//! Turns resolved records into [`FetchResult`]s with bounded parallelism.
//! One task per record; each read carries its own deadline; a failed or
//! timed-out read becomes a `Failure` for that record and never disturbs the
//! others. The coordinator itself never retries.
//!
//! Two ways to consume the results:
//!
//! - [`FetchCoordinator::fetch_all`] is a barrier: it returns only once every
//!   record has a result, in record order.
//! - [`FetchCoordinator::fetch_ordered`] is a window: at most
//!   `max_concurrency` reads are in flight or waiting to be consumed, and
//!   results are yielded in record order as soon as the head is ready.
//!
//! Dropping either future/stream aborts the reads still running.

use super::gauge::PayloadGauge;
use super::job::{FetchFailure, FetchOutcome, FetchResult};
use crate::adapters::traits::ObjectReader;
use crate::domain::{ObjectReadError, PhotoRecord};
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

/// Issues object reads for a set of records
#[derive(Clone)]
pub struct FetchCoordinator {
    reader: Arc<dyn ObjectReader>,
    max_concurrency: usize,
    read_timeout: Duration,
    gauge: PayloadGauge,
}

impl FetchCoordinator {
    /// Create a coordinator; `max_concurrency` is raised to at least 1
    pub fn new(reader: Arc<dyn ObjectReader>, max_concurrency: usize, read_timeout: Duration) -> Self {
        Self {
            reader,
            max_concurrency: max_concurrency.max(1),
            read_timeout,
            gauge: PayloadGauge::new(),
        }
    }

    /// Count payloads on `gauge` instead of a private one
    pub fn with_gauge(mut self, gauge: PayloadGauge) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn gauge(&self) -> &PayloadGauge {
        &self.gauge
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Read every record's object and wait for all of them
    ///
    /// Returns exactly one result per record, in the order of `records`.
    pub async fn fetch_all(&self, records: Vec<PhotoRecord>) -> Vec<FetchResult> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, record) in records.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            let reader = Arc::clone(&self.reader);
            let gauge = self.gauge.clone();
            let timeout = self.read_timeout;

            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => read_one(reader.as_ref(), &record, timeout, &gauge).await,
                    Err(_) => FetchOutcome::Failure(FetchFailure::from(ObjectReadError::Io(
                        "fetch pool closed".to_string(),
                    ))),
                };
                (index, FetchResult { record, outcome })
            });
        }

        let mut slots: Vec<Option<FetchResult>> = Vec::with_capacity(records.len());
        slots.resize_with(records.len(), || None);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    debug_assert!(slots[index].is_none(), "slot {index} written twice");
                    slots[index] = Some(result);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Fetch task failed");
                }
            }
        }

        // A panicked task leaves its slot empty; it still owes a result.
        slots
            .into_iter()
            .zip(records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| FetchResult {
                    record,
                    outcome: FetchOutcome::Failure(FetchFailure::from(ObjectReadError::Io(
                        "fetch task aborted".to_string(),
                    ))),
                })
            })
            .collect()
    }

    /// Stream results in record order with a bounded window
    pub fn fetch_ordered(&self, records: Vec<PhotoRecord>) -> BoxStream<'static, FetchResult> {
        let reader = Arc::clone(&self.reader);
        let gauge = self.gauge.clone();
        let timeout = self.read_timeout;

        stream::iter(records)
            .map(move |record| {
                let reader = Arc::clone(&reader);
                let gauge = gauge.clone();
                let task_record = record.clone();
                let handle = AbortOnDrop(tokio::spawn(async move {
                    read_one(reader.as_ref(), &task_record, timeout, &gauge).await
                }));

                async move {
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(photo_id = %record.id, error = %e, "Fetch task failed");
                            FetchOutcome::Failure(FetchFailure::from(ObjectReadError::Io(
                                "fetch task aborted".to_string(),
                            )))
                        }
                    };
                    FetchResult { record, outcome }
                }
            })
            .buffered(self.max_concurrency)
            .boxed()
    }
}

/// Read one object under its own deadline
async fn read_one(
    reader: &dyn ObjectReader,
    record: &PhotoRecord,
    timeout: Duration,
    gauge: &PayloadGauge,
) -> FetchOutcome {
    match tokio::time::timeout(timeout, reader.read(&record.storage_key)).await {
        Ok(Ok(data)) => FetchOutcome::Success(gauge.track(data)),
        Ok(Err(e)) => FetchOutcome::Failure(e.into()),
        Err(_) => FetchOutcome::Failure(ObjectReadError::Timeout(timeout).into()),
    }
}

/// Join handle that aborts its task when dropped unfinished
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, tokio::task::JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryObjectStore;
    use crate::core::export::job::FailureReason;
    use crate::domain::{PhotoId, StorageKey};
    use chrono::Utc;

    fn record(id: &str) -> PhotoRecord {
        PhotoRecord::new(
            PhotoId::new(id).unwrap(),
            format!("{id}.jpg"),
            StorageKey::new(format!("key-{id}")).unwrap(),
            Utc::now(),
        )
    }

    fn store_with(ids: &[&str]) -> Arc<InMemoryObjectStore> {
        let store = Arc::new(InMemoryObjectStore::new());
        for id in ids {
            store.put(StorageKey::new(format!("key-{id}")).unwrap(), id.as_bytes().to_vec());
        }
        store
    }

    #[tokio::test]
    async fn test_fetch_all_one_result_per_record_in_order() {
        let store = store_with(&["a", "b", "c"]);
        store.delay(StorageKey::new("key-a").unwrap(), Duration::from_millis(30));
        let coordinator = FetchCoordinator::new(store.clone(), 4, Duration::from_secs(1));

        let results = coordinator
            .fetch_all(vec![record("a"), record("b"), record("c")])
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.outcome.is_success()));
    }

    #[tokio::test]
    async fn test_timeout_is_scoped_to_one_record() {
        let store = store_with(&["a", "b", "c"]);
        store.hang(StorageKey::new("key-b").unwrap());
        let coordinator = FetchCoordinator::new(store.clone(), 4, Duration::from_millis(50));

        let results = coordinator
            .fetch_all(vec![record("a"), record("b"), record("c")])
            .await;

        assert!(results[0].outcome.is_success());
        assert!(results[2].outcome.is_success());
        match &results[1].outcome {
            FetchOutcome::Failure(f) => assert_eq!(f.reason, FailureReason::Timeout),
            FetchOutcome::Success(_) => panic!("hung read should time out"),
        }
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let store = store_with(&["a"]);
        let coordinator = FetchCoordinator::new(store, 2, Duration::from_secs(1));

        let results = coordinator.fetch_all(vec![record("a"), record("zz")]).await;
        match &results[1].outcome {
            FetchOutcome::Failure(f) => assert_eq!(f.reason, FailureReason::NotFound),
            FetchOutcome::Success(_) => panic!("missing object should fail"),
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_but_parallel() {
        let ids: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let store = store_with(&id_refs);
        store.set_default_delay(Duration::from_millis(20));
        let coordinator = FetchCoordinator::new(store.clone(), 3, Duration::from_secs(1));

        let records = id_refs.iter().map(|id| record(id)).collect();
        let results = coordinator.fetch_all(records).await;

        assert_eq!(results.len(), 12);
        assert!(store.peak_in_flight() <= 3);
        assert!(store.peak_in_flight() > 1);
    }

    #[tokio::test]
    async fn test_fetch_ordered_yields_in_record_order() {
        let store = store_with(&["a", "b", "c"]);
        store.delay(StorageKey::new("key-a").unwrap(), Duration::from_millis(40));
        let coordinator = FetchCoordinator::new(store, 3, Duration::from_secs(1));

        let results: Vec<FetchResult> = coordinator
            .fetch_ordered(vec![record("a"), record("b"), record("c")])
            .collect()
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_ordered_bounds_resident_payloads() {
        let ids: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let store = store_with(&id_refs);
        let coordinator = FetchCoordinator::new(store, 4, Duration::from_secs(1));

        let mut stream = coordinator.fetch_ordered(id_refs.iter().map(|id| record(id)).collect());
        let mut seen = 0;
        while let Some(result) = stream.next().await {
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert!(result.outcome.is_success());
            seen += 1;
        }

        assert_eq!(seen, 20);
        assert!(coordinator.gauge().peak() <= 4);
        assert_eq!(coordinator.gauge().pending(), 0);
    }

    #[tokio::test]
    async fn test_dropping_stream_aborts_reads() {
        let store = store_with(&["a", "b", "c"]);
        store.set_default_delay(Duration::from_secs(30));
        let coordinator = FetchCoordinator::new(store.clone(), 3, Duration::from_secs(60));

        let mut stream = coordinator.fetch_ordered(vec![record("a"), record("b"), record("c")]);
        let first = tokio::time::timeout(Duration::from_millis(30), stream.next()).await;
        assert!(first.is_err());
        drop(stream);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.reads_started(), 3);
        assert_eq!(store.reads_completed(), 0);
    }
}
