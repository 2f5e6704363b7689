//! Domain identifier types with validation
//!
//! Newtype wrappers keep photo identifiers and storage keys from being mixed
//! up with each other or with plain display names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Photo identifier newtype wrapper
///
/// The logical identity of a photo in the catalog. The backing catalog uses
/// UUIDs or integers, but the value is treated as opaque.
///
/// # Examples
///
/// ```
/// use photobundle::domain::ids::PhotoId;
/// use std::str::FromStr;
///
/// let id = PhotoId::from_str("b1946ac9-2ea0-4b6b-8cfa-0d3c24b5fc9e").unwrap();
/// assert_eq!(id.as_str(), "b1946ac9-2ea0-4b6b-8cfa-0d3c24b5fc9e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    /// Creates a new PhotoId, trimming surrounding whitespace
    ///
    /// # Returns
    ///
    /// Returns `Err` if the identifier is empty after trimming
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Photo ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the photo ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Parses a comma-separated list of IDs, skipping blank items
    ///
    /// ```
    /// use photobundle::domain::ids::PhotoId;
    ///
    /// let ids = PhotoId::parse_list("a, b,,c").unwrap();
    /// assert_eq!(ids.len(), 3);
    /// ```
    pub fn parse_list(input: &str) -> Result<Vec<Self>, String> {
        input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.trim().is_empty())
            .map(Self::new)
            .collect()
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhotoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PhotoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Storage key newtype wrapper
///
/// Key of a binary object inside the storage bucket, e.g.
/// `1718035200000-IMG_0001.jpg`. Keys never start with a slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Creates a new StorageKey, stripping leading slashes
    pub fn new(key: impl Into<String>) -> Result<Self, String> {
        let key = key.into();
        let key = key.trim().trim_start_matches('/');
        if key.is_empty() {
            return Err("Storage key cannot be empty".to_string());
        }
        Ok(Self(key.to_string()))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the `/`-separated segments of the key
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StorageKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_id_valid() {
        let id = PhotoId::new("42").unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_photo_id_trims_whitespace() {
        let id = PhotoId::new("  abc \n").unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_photo_id_empty() {
        assert!(PhotoId::new("").is_err());
        assert!(PhotoId::new("   ").is_err());
    }

    #[test]
    fn test_parse_list() {
        let ids = PhotoId::parse_list("a,b , c\nd").unwrap();
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(PhotoId::parse_list(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_storage_key_strips_leading_slash() {
        let key = StorageKey::new("/events/2024/img.jpg").unwrap();
        assert_eq!(key.as_str(), "events/2024/img.jpg");
        assert_eq!(key.segments().collect::<Vec<_>>(), vec!["events", "2024", "img.jpg"]);
    }

    #[test]
    fn test_storage_key_empty() {
        assert!(StorageKey::new("/").is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id = PhotoId::new("p-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"p-1\"");
    }
}
