//! Domain models and types for photobundle.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PhotoId`], [`StorageKey`])
//! - **Catalog record** ([`PhotoRecord`]) and gallery pages ([`PageRequest`], [`PhotoPage`])
//! - **Error types** ([`BundleError`], [`ObjectReadError`], [`CatalogError`], [`ArchiveError`])
//! - **Result type alias** ([`Result`])
//!
//! ```rust
//! use photobundle::domain::{PhotoId, StorageKey};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let id = PhotoId::new("42")?;
//! let key = StorageKey::new("1718035200000-IMG_0001.jpg")?;
//!
//! // This won't compile - type safety prevents mixing IDs and keys
//! // let wrong: PhotoId = key;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod photo;
pub mod result;

pub use errors::{ArchiveError, BundleError, CatalogError, ObjectReadError};
pub use ids::{PhotoId, StorageKey};
pub use photo::{PageRequest, PhotoPage, PhotoRecord, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use result::Result;
