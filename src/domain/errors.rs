//! Domain error types
//!
//! Errors are split by layer: per-object read failures ([`ObjectReadError`])
//! never escalate on their own, catalog failures ([`CatalogError`]) are fatal
//! for a job, and archive failures ([`ArchiveError`]) are fatal once bytes
//! have reached the sink. [`BundleError`] is the crate-wide error returned by
//! every job-level operation. Third-party error types are not exposed.

use std::time::Duration;
use thiserror::Error;

/// Main photobundle error type
#[derive(Debug, Error)]
pub enum BundleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Catalog could not be queried; fatal for the whole job
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// None of the requested IDs resolved to a catalog record
    #[error("No photos found for {requested} requested id(s)")]
    NoPhotosFound { requested: usize },

    /// Every resolved photo failed to download and the job is configured to
    /// treat that as an error instead of producing an empty archive
    #[error("All {failed} photo download(s) failed")]
    AllDownloadsFailed { failed: usize },

    /// Writing to the output sink failed; partial output may have been sent
    #[error("Failed to write to output: {0}")]
    SinkWrite(String),

    /// Archive container errors other than sink failures
    #[error("Archive error: {0}")]
    Archive(String),

    /// Single photo not found (catalog or storage)
    #[error("Photo not found: {0}")]
    NotFound(String),

    /// Single photo download failed for a reason other than absence
    #[error("Download error: {0}")]
    DownloadFailed(String),

    /// Export stopped by a shutdown signal
    #[error("Export interrupted by shutdown signal")]
    Interrupted,

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl BundleError {
    /// HTTP status an upstream handler should answer with
    ///
    /// Client-side problems (unknown IDs, bad input) map to 4xx, everything
    /// else to 5xx.
    pub fn http_status(&self) -> u16 {
        match self {
            BundleError::NoPhotosFound { .. } | BundleError::NotFound(_) => 404,
            BundleError::Validation(_) => 400,
            BundleError::CatalogUnavailable(_) | BundleError::Interrupted => 503,
            BundleError::AllDownloadsFailed { .. } => 502,
            _ => 500,
        }
    }

    /// Whether the error was caused by the request rather than the system
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

/// Failure to read one object from the blob store
///
/// Scoped to a single record: recorded in the job summary, excluded from
/// the archive, never fatal for the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectReadError {
    /// The object does not exist under the given key
    #[error("object not found: {0}")]
    NotFound(String),

    /// The read did not complete before its deadline
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or server failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl ObjectReadError {
    /// Whether retrying the same read could succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, ObjectReadError::NotFound(_))
    }
}

/// Catalog lookup errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Catalog could not be reached or answered with a server error
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// Catalog answered with something that is not a list of photo rows
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

/// Archive container errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Writing to the sink failed (e.g. client disconnect)
    #[error("sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// Operation not allowed in the writer's current state
    #[error("invalid archive state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Entry count, size or offset exceeds the classic ZIP limits
    #[error("archive limit exceeded: {0}")]
    LimitExceeded(String),

    /// Compressing an entry failed
    #[error("compression failed: {0}")]
    Compression(String),

    /// Archive bytes could not be parsed
    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

impl From<CatalogError> for BundleError {
    fn from(err: CatalogError) -> Self {
        BundleError::CatalogUnavailable(err.to_string())
    }
}

impl From<ArchiveError> for BundleError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::SinkWrite(e) => BundleError::SinkWrite(e.to_string()),
            other => BundleError::Archive(other.to_string()),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        BundleError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for BundleError {
    fn from(err: toml::de::Error) -> Self {
        BundleError::Configuration(format!("TOML parse error: {err}"))
    }
}
