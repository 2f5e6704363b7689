//! In-memory catalog and object store
//!
//! Used by tests and for local experiments. The object store can inject
//! per-key delays, hangs and failures and counts reads, so concurrency and
//! cancellation behaviour can be observed from the outside.

use super::traits::{CatalogLookup, ObjectReader};
use crate::domain::{
    CatalogError, ObjectReadError, PageRequest, PhotoId, PhotoPage, PhotoRecord, StorageKey,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Catalog backed by a map of records
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RwLock<BTreeMap<PhotoId, PhotoRecord>>,
    unavailable: AtomicBool,
    resolve_calls: AtomicUsize,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding `records`
    pub fn with_records(records: impl IntoIterator<Item = PhotoRecord>) -> Self {
        let catalog = Self::new();
        for record in records {
            catalog.insert(record);
        }
        catalog
    }

    /// Insert or replace a record
    pub fn insert(&self, record: PhotoRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.id.clone(), record);
        }
    }

    /// Make every subsequent `resolve` fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `resolve` calls made so far
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn resolve(&self, ids: &[PhotoId]) -> Result<Vec<PhotoRecord>, CatalogError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(
                "in-memory catalog marked unavailable".to_string(),
            ));
        }

        let records = self
            .records
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".to_string()))?;

        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    async fn list(&self, page: PageRequest) -> Result<PhotoPage, CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable(
                "in-memory catalog marked unavailable".to_string(),
            ));
        }

        let records = self
            .records
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".to_string()))?;

        let mut all: Vec<&PhotoRecord> = records.values().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let photos = all
            .into_iter()
            .skip(offset)
            .take(page.limit() as usize)
            .cloned()
            .collect();
        Ok(PhotoPage::new(page, photos, records.len() as u64))
    }
}

/// Injected behaviour for one key
#[derive(Debug, Clone)]
enum Behavior {
    Delay(Duration),
    Hang,
    Fail(ObjectReadError),
    /// Fail the first `n` reads, then serve normally
    FailTimes(usize, ObjectReadError),
}

/// Object store backed by a map of payloads
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<StorageKey, Bytes>>,
    behaviors: RwLock<HashMap<StorageKey, Behavior>>,
    default_delay: RwLock<Option<Duration>>,
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key`
    pub fn put(&self, key: StorageKey, data: impl Into<Bytes>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key, data.into());
        }
    }

    /// Delay every read of `key` by `delay`
    pub fn delay(&self, key: StorageKey, delay: Duration) {
        self.set_behavior(key, Behavior::Delay(delay));
    }

    /// Make reads of `key` never complete
    pub fn hang(&self, key: StorageKey) {
        self.set_behavior(key, Behavior::Hang);
    }

    /// Make every read of `key` fail with `error`
    pub fn fail(&self, key: StorageKey, error: ObjectReadError) {
        self.set_behavior(key, Behavior::Fail(error));
    }

    /// Make the first `times` reads of `key` fail with `error`
    pub fn fail_times(&self, key: StorageKey, times: usize, error: ObjectReadError) {
        self.set_behavior(key, Behavior::FailTimes(times, error));
    }

    /// Delay every read without an explicit behaviour
    pub fn set_default_delay(&self, delay: Duration) {
        if let Ok(mut default_delay) = self.default_delay.write() {
            *default_delay = Some(delay);
        }
    }

    /// Reads that have started
    pub fn reads_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Reads that ran to completion (success or failure)
    pub fn reads_completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of reads observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn set_behavior(&self, key: StorageKey, behavior: Behavior) {
        if let Ok(mut behaviors) = self.behaviors.write() {
            behaviors.insert(key, behavior);
        }
    }

    /// Take the behaviour for `key`, consuming one failure from `FailTimes`
    fn next_behavior(&self, key: &StorageKey) -> Option<Behavior> {
        let mut behaviors = self.behaviors.write().ok()?;
        match behaviors.get_mut(key) {
            Some(Behavior::FailTimes(remaining, error)) => {
                if *remaining == 0 {
                    None
                } else {
                    *remaining -= 1;
                    Some(Behavior::Fail(error.clone()))
                }
            }
            Some(other) => Some(other.clone()),
            None => None,
        }
    }

    async fn serve(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError> {
        match self.next_behavior(key) {
            Some(Behavior::Hang) => {
                std::future::pending::<()>().await;
            }
            Some(Behavior::Fail(error)) => return Err(error),
            Some(Behavior::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Behavior::FailTimes(..)) | None => {
                let default_delay = self.default_delay.read().ok().and_then(|d| *d);
                if let Some(delay) = default_delay {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        self.objects
            .read()
            .map_err(|_| ObjectReadError::Io("object store lock poisoned".to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectReadError::NotFound(key.to_string()))
    }
}

/// Decrements the in-flight counter even when the read is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectReader for InMemoryObjectStore {
    async fn read(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let result = self.serve(key).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, name: &str) -> PhotoRecord {
        PhotoRecord::new(
            PhotoId::new(id).unwrap(),
            name,
            StorageKey::new(format!("{id}-{name}")).unwrap(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_catalog_omits_unknown_and_dedups() {
        let catalog = InMemoryCatalog::with_records([record("1", "a.jpg"), record("2", "b.jpg")]);
        let ids: Vec<PhotoId> = ["1", "9", "1", "2"]
            .iter()
            .map(|s| PhotoId::new(*s).unwrap())
            .collect();

        let resolved = catalog.resolve(&ids).await.unwrap();
        let names: Vec<_> = resolved.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
        assert_eq!(catalog.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_catalog_lists_newest_first() {
        let catalog = InMemoryCatalog::new();
        for (id, minute) in [("1", 5), ("2", 30), ("3", 10)] {
            let mut photo = record(id, "x.jpg");
            photo.created_at = Utc.with_ymd_and_hms(2024, 9, 14, 18, minute, 0).unwrap();
            catalog.insert(photo);
        }

        let first = catalog.list(PageRequest::new(Some(1), Some(2))).await.unwrap();
        let ids: Vec<_> = first.photos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(first.total, 3);
        assert!(first.has_more);

        let second = catalog.list(PageRequest::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(second.photos.len(), 1);
        assert_eq!(second.photos[0].id.as_str(), "1");
        assert!(!second.has_more);

        let past_end = catalog.list(PageRequest::new(Some(9), Some(2))).await.unwrap();
        assert!(past_end.photos.is_empty());
        assert_eq!(past_end.total, 3);
    }

    #[tokio::test]
    async fn test_catalog_unavailable() {
        let catalog = InMemoryCatalog::new();
        catalog.set_unavailable(true);
        let ids = vec![PhotoId::new("1").unwrap()];
        assert!(matches!(
            catalog.resolve(&ids).await,
            Err(CatalogError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_store_read_and_missing() {
        let store = InMemoryObjectStore::new();
        let key = StorageKey::new("k1").unwrap();
        store.put(key.clone(), b"payload".to_vec());

        assert_eq!(store.read(&key).await.unwrap(), Bytes::from_static(b"payload"));
        let missing = StorageKey::new("missing").unwrap();
        assert!(matches!(
            store.read(&missing).await,
            Err(ObjectReadError::NotFound(_))
        ));
        assert_eq!(store.reads_started(), 2);
        assert_eq!(store.reads_completed(), 2);
    }

    #[tokio::test]
    async fn test_store_fail_times_then_serves() {
        let store = InMemoryObjectStore::new();
        let key = StorageKey::new("flaky").unwrap();
        store.put(key.clone(), b"ok".to_vec());
        store.fail_times(key.clone(), 2, ObjectReadError::Io("reset".into()));

        assert!(store.read(&key).await.is_err());
        assert!(store.read(&key).await.is_err());
        assert!(store.read(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_hang_is_cancellable() {
        let store = InMemoryObjectStore::new();
        let key = StorageKey::new("stuck").unwrap();
        store.put(key.clone(), b"never".to_vec());
        store.hang(key.clone());

        let result = tokio::time::timeout(Duration::from_millis(20), store.read(&key)).await;
        assert!(result.is_err());
        assert_eq!(store.reads_started(), 1);
        assert_eq!(store.reads_completed(), 0);
        assert_eq!(store.peak_in_flight(), 1);
    }
}
