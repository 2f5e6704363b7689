//! Wire models for the managed backend's REST catalog

use crate::domain::{PhotoId, PhotoRecord, StorageKey};
use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

/// One row of the photo table as returned by the REST endpoint
///
/// `id` is an integer or UUID column depending on the schema, so it is kept
/// as a raw JSON value until conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRow {
    pub id: serde_json::Value,
    pub file_name: String,
    pub file_url: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl PhotoRow {
    /// Convert the row into a catalog record
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the row has no usable ID or
    /// its URL yields no storage key.
    pub fn into_record(self, bucket: &str) -> Result<PhotoRecord, String> {
        let id = match &self.id {
            serde_json::Value::String(s) => PhotoId::new(s.clone())?,
            serde_json::Value::Number(n) => PhotoId::new(n.to_string())?,
            other => return Err(format!("unsupported id value: {other}")),
        };

        let storage_key = StorageKey::new(storage_key_from_url(&self.file_url, bucket))
            .map_err(|e| format!("row {id}: {e}"))?;

        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default();

        Ok(PhotoRecord::new(id, self.file_name, storage_key, created_at))
    }
}

/// Derive the storage key from a public object URL
///
/// The key is everything after the last `/{bucket}/` marker, without any
/// query string, percent-decoded. A value without the marker is taken to be
/// the key itself.
pub fn storage_key_from_url(file_url: &str, bucket: &str) -> String {
    let marker = format!("/{bucket}/");
    let raw = match file_url.rfind(&marker) {
        Some(pos) => &file_url[pos + marker.len()..],
        None => file_url,
    };
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Parse RFC 3339 timestamps, or naive ones (`timestamp` columns) as UTC
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
