//! Collaborator contracts consumed by the export pipeline
//!
//! The pipeline never talks to a backend directly. It goes through these two
//! traits so the managed-backend adapter, in-memory test doubles and
//! decorators like [`crate::core::export::RetryingReader`] are interchangeable.

use crate::domain::{
    CatalogError, ObjectReadError, PageRequest, PhotoId, PhotoPage, PhotoRecord, StorageKey,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Reads a single binary object from the blob store
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Read the whole object stored under `key`
    ///
    /// # Errors
    ///
    /// Returns `ObjectReadError::NotFound` when no object exists under the
    /// key, `Timeout` when the backend's own deadline passes and `Io` for any
    /// other transport or server failure.
    async fn read(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError>;
}

/// Resolves logical photo IDs to catalog records
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve `ids` to the records that exist
    ///
    /// Unknown IDs are silently omitted. Duplicates in `ids` resolve once.
    /// The order of the returned records is unspecified.
    ///
    /// # Errors
    ///
    /// Fails only when the catalog itself cannot be queried.
    async fn resolve(&self, ids: &[PhotoId]) -> Result<Vec<PhotoRecord>, CatalogError>;

    /// One page of the whole catalog, newest upload first
    ///
    /// A page past the end is empty, with `total` still reported.
    async fn list(&self, page: PageRequest) -> Result<PhotoPage, CatalogError>;
}

#[async_trait]
impl<T: ObjectReader + ?Sized> ObjectReader for Arc<T> {
    async fn read(&self, key: &StorageKey) -> Result<Bytes, ObjectReadError> {
        (**self).read(key).await
    }
}

#[async_trait]
impl<T: CatalogLookup + ?Sized> CatalogLookup for Arc<T> {
    async fn resolve(&self, ids: &[PhotoId]) -> Result<Vec<PhotoRecord>, CatalogError> {
        (**self).resolve(ids).await
    }

    async fn list(&self, page: PageRequest) -> Result<PhotoPage, CatalogError> {
        (**self).list(page).await
    }
}
