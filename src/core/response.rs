//! Response metadata for archive and single-photo downloads
//!
//! The HTTP layer is not part of this crate; these values are what it sends
//! alongside a streamed body.

use chrono::{DateTime, Utc};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type and attachment file name of a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub content_type: &'static str,
    pub filename: String,
}

impl ResponseMetadata {
    /// Metadata for an archive generated at `now`
    ///
    /// The file name is `{prefix}_{YYYY-MM-DDTHH-MM-SS}.zip`.
    pub fn for_archive(prefix: &str, now: DateTime<Utc>) -> Self {
        Self {
            content_type: ZIP_CONTENT_TYPE,
            filename: archive_filename(prefix, now),
        }
    }

    /// Metadata for a single photo served under its display name
    pub fn for_photo(display_name: &str) -> Self {
        Self {
            content_type: BINARY_CONTENT_TYPE,
            filename: display_name.to_string(),
        }
    }

    /// `Content-Disposition` value
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", escape_filename(&self.filename))
    }

    /// Header pairs in the order they are sent
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type.to_string()),
            ("Content-Disposition", self.content_disposition()),
        ]
    }
}

/// `{prefix}_{YYYY-MM-DDTHH-MM-SS}.zip`
pub fn archive_filename(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}.zip", now.format("%Y-%m-%dT%H-%M-%S"))
}

/// Escape a file name for a quoted header parameter
fn escape_filename(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_control() => escaped.push('_'),
            c => escaped.push(c),
        }
    }
    escaped
}
