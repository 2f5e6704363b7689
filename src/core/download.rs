//! Single-photo download
//!
//! The degenerate one-item case of the export pipeline: resolve one ID,
//! read its object and stream the bytes to the caller unchanged.

use super::response::ResponseMetadata;
use crate::adapters::traits::{CatalogLookup, ObjectReader};
use crate::domain::{BundleError, ObjectReadError, PhotoId, PhotoRecord, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Result of a completed single download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub photo_id: PhotoId,
    pub metadata: ResponseMetadata,
    pub size: u64,
}

/// Serves one photo at a time
pub struct PhotoDownloader {
    catalog: Arc<dyn CatalogLookup>,
    reader: Arc<dyn ObjectReader>,
    read_timeout: Duration,
}

impl PhotoDownloader {
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        reader: Arc<dyn ObjectReader>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            reader,
            read_timeout,
        }
    }

    /// Resolve `id` to its catalog record
    ///
    /// # Errors
    ///
    /// `NotFound` when the catalog has no record, `CatalogUnavailable` when
    /// it cannot be queried.
    pub async fn locate(&self, id: &PhotoId) -> Result<PhotoRecord> {
        let records = self.catalog.resolve(std::slice::from_ref(id)).await?;
        records
            .into_iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| BundleError::NotFound(format!("no catalog record for photo {id}")))
    }

    /// Read the object behind `record`
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing object, `DownloadFailed` for timeouts and
    /// transport failures.
    pub async fn fetch(&self, record: &PhotoRecord) -> Result<Bytes> {
        let read = tokio::time::timeout(self.read_timeout, self.reader.read(&record.storage_key));
        match read.await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(ObjectReadError::NotFound(key))) => Err(BundleError::NotFound(format!(
                "object {key} for photo {}",
                record.id
            ))),
            Ok(Err(e)) => Err(BundleError::DownloadFailed(format!("photo {}: {e}", record.id))),
            Err(_) => Err(BundleError::DownloadFailed(format!(
                "photo {}: read timed out after {:?}",
                record.id, self.read_timeout
            ))),
        }
    }

    /// Resolve, read and write one photo to `sink`
    ///
    /// Nothing is written unless the read succeeded.
    pub async fn download<W>(&self, id: &PhotoId, sink: W) -> Result<DownloadReceipt>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let record = self.locate(id).await?;
        self.download_record(record, sink).await
    }

    /// Read and write an already located photo to `sink`
    pub async fn download_record<W>(&self, record: PhotoRecord, mut sink: W) -> Result<DownloadReceipt>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let id = &record.id;
        let data = match self.fetch(&record).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(photo_id = %id, storage_key = %record.storage_key, error = %e, "Photo download failed");
                return Err(e);
            }
        };

        sink.write_all(&data)
            .await
            .map_err(|e| BundleError::SinkWrite(e.to_string()))?;
        sink.flush()
            .await
            .map_err(|e| BundleError::SinkWrite(e.to_string()))?;

        tracing::info!(photo_id = %id, size = data.len(), "Photo downloaded");

        Ok(DownloadReceipt {
            photo_id: record.id,
            metadata: ResponseMetadata::for_photo(&record.display_name),
            size: data.len() as u64,
        })
    }
}
