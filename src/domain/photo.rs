//! Photo catalog record
//!
//! A [`PhotoRecord`] is created on ingestion, owned by the catalog and
//! immutable afterwards. The export pipeline only ever reads it.
//!
//! [`PageRequest`] and [`PhotoPage`] describe one page of the gallery
//! listing, newest upload first.

use super::ids::{PhotoId, StorageKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of one stored photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Logical photo identifier
    pub id: PhotoId,

    /// Original file name shown to guests, used as the archive entry name
    pub display_name: String,

    /// Key of the binary object in the blob store
    pub storage_key: StorageKey,

    /// Upload timestamp
    pub created_at: DateTime<Utc>,
}

impl PhotoRecord {
    /// Create a new photo record
    pub fn new(
        id: PhotoId,
        display_name: impl Into<String>,
        storage_key: StorageKey,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            storage_key,
            created_at,
        }
    }
}

/// Page size used when none is requested
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page the listing serves
pub const MAX_PAGE_LIMIT: u32 = 50;

/// A normalised gallery page request
///
/// Pages are 1-based. Zero or missing values fall back to the defaults and
/// the limit is clamped to `1..=MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index of the first row on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Index of the last row on this page, inclusive
    pub fn last(&self) -> u64 {
        self.offset() + u64::from(self.limit) - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of the gallery listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhotoPage {
    pub photos: Vec<PhotoRecord>,
    /// Photos in the whole catalog
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    /// Whether a later page holds more photos
    pub has_more: bool,
}

impl PhotoPage {
    pub fn new(request: PageRequest, photos: Vec<PhotoRecord>, total: u64) -> Self {
        Self {
            photos,
            total,
            page: request.page(),
            limit: request.limit(),
            has_more: request.offset() + u64::from(request.limit()) < total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test]
    fn test_photo_record_serde() {
        let record = PhotoRecord::new(
            PhotoId::from_str("7").unwrap(),
            "beach.jpg",
            StorageKey::from_str("1718035200000-beach.jpg").unwrap(),
            "2024-06-10T16:00:00Z".parse().unwrap(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["display_name"], "beach.jpg");
        assert_eq!(json["storage_key"], "1718035200000-beach.jpg");

        let back: PhotoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test_case(None, None, 1, 20 ; "defaults")]
    #[test_case(Some(0), Some(0), 1, 20 ; "zero means default")]
    #[test_case(Some(3), Some(10), 3, 10 ; "kept")]
    #[test_case(Some(2), Some(500), 2, 50 ; "limit capped")]
    fn test_page_request_clamps(page: Option<u32>, limit: Option<u32>, want_page: u32, want_limit: u32) {
        let request = PageRequest::new(page, limit);
        assert_eq!(request.page(), want_page);
        assert_eq!(request.limit(), want_limit);
    }

    #[test]
    fn test_page_request_range() {
        let request = PageRequest::new(Some(3), Some(20));
        assert_eq!(request.offset(), 40);
        assert_eq!(request.last(), 59);
    }

    #[test_case(1, 20, 57, true ; "first of three")]
    #[test_case(3, 20, 57, false ; "last partial page")]
    #[test_case(2, 20, 40, false ; "exact fit")]
    #[test_case(1, 20, 0, false ; "empty catalog")]
    fn test_page_has_more(page: u32, limit: u32, total: u64, expected: bool) {
        let page = PhotoPage::new(PageRequest::new(Some(page), Some(limit)), Vec::new(), total);
        assert_eq!(page.has_more, expected);
    }
}
