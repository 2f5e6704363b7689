//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use photobundle::adapters::memory::{InMemoryCatalog, InMemoryObjectStore};
use photobundle::core::export::{ExportOrchestrator, ExportSettings, FetchStrategy};
use photobundle::domain::{PhotoId, PhotoRecord, StorageKey};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Catalog and store pre-populated with photos
pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub store: Arc<InMemoryObjectStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            store: Arc::new(InMemoryObjectStore::new()),
        }
    }

    /// Add a photo named `name` whose object holds `data`
    pub fn photo(self, id: &str, name: &str, data: impl Into<Vec<u8>>) -> Self {
        let key = key_for(id);
        self.catalog.insert(PhotoRecord::new(
            photo_id(id),
            name,
            key.clone(),
            Utc.with_ymd_and_hms(2024, 9, 14, 18, 30, 0).unwrap(),
        ));
        self.store.put(key, data.into());
        self
    }

    /// Add a catalog record without an object behind it
    pub fn dangling(self, id: &str, name: &str) -> Self {
        self.catalog.insert(PhotoRecord::new(
            photo_id(id),
            name,
            key_for(id),
            Utc.with_ymd_and_hms(2024, 9, 14, 18, 30, 0).unwrap(),
        ));
        self
    }

    pub fn orchestrator(&self, settings: ExportSettings) -> ExportOrchestrator {
        ExportOrchestrator::new(self.catalog.clone(), self.store.clone(), settings)
    }
}

pub fn photo_id(id: &str) -> PhotoId {
    PhotoId::new(id).unwrap()
}

pub fn ids(raw: &[&str]) -> Vec<PhotoId> {
    raw.iter().map(|s| photo_id(s)).collect()
}

pub fn key_for(id: &str) -> StorageKey {
    StorageKey::new(format!("uploads/{id}.bin")).unwrap()
}

pub fn settings(strategy: FetchStrategy, max_concurrency: usize, read_timeout: Duration) -> ExportSettings {
    ExportSettings {
        max_concurrency,
        read_timeout,
        strategy,
        ..ExportSettings::default()
    }
}

/// Sink that accepts `limit` bytes and then fails every write
pub struct FailingSink {
    pub written: Vec<u8>,
    limit: usize,
    pub flushes: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn after(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.written.len() + buf.len() > self.limit {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "client disconnected",
            )));
        }
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
