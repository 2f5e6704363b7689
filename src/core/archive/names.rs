//! Entry naming: sanitisation and collision handling

use std::collections::HashSet;

/// Hands out unique entry names for one archive
///
/// Names are compared case-insensitively so the archive extracts cleanly on
/// case-insensitive filesystems. A clash is resolved by inserting a counter
/// before the extension: `photo.jpg`, `photo (2).jpg`, `photo (3).jpg`.
#[derive(Debug, Default)]
pub struct EntryNamer {
    taken: HashSet<String>,
}

impl EntryNamer {
    /// Create a namer with no names taken
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a unique name derived from `raw`
    ///
    /// `fallback` is used when `raw` sanitises to nothing usable.
    pub fn claim(&mut self, raw: &str, fallback: &str) -> String {
        let base = match sanitize(raw) {
            Some(name) => name,
            None => sanitize(fallback).unwrap_or_else(|| "photo".to_string()),
        };

        if self.taken.insert(base.to_lowercase()) {
            return base;
        }

        let (stem, ext) = split_extension(&base);
        let mut counter = 2u32;
        loop {
            let candidate = format!("{stem} ({counter}){ext}");
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Number of names handed out
    pub fn len(&self) -> usize {
        self.taken.len()
    }

    /// Whether no name has been handed out yet
    pub fn is_empty(&self) -> bool {
        self.taken.is_empty()
    }
}

/// Make `raw` safe as a flat archive entry name
///
/// Path separators become `_` and control characters are dropped. Returns
/// `None` for names that are empty or consist only of dots.
pub fn sanitize(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return None;
    }
    Some(cleaned.to_string())
}

/// Split `name` into stem and extension (with its dot)
///
/// A leading dot does not start an extension, so `.hidden` has none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}
