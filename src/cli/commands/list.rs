//! List command implementation
//!
//! Prints one page of the gallery, newest upload first, so IDs can be picked
//! for `export` or `download`.

use crate::adapters::supabase::SupabaseClient;
use crate::adapters::CatalogLookup;
use crate::cli::{exit_code, exit_code_for};
use crate::config::load_config;
use crate::domain::{BundleError, PageRequest, PhotoPage};
use clap::Args;
use std::fmt::Write as _;

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Page number, starting at 1
    #[arg(long)]
    pub page: Option<u32>,

    /// Photos per page (at most 50) [default: 20]
    #[arg(long)]
    pub limit: Option<u32>,

    /// Print the page as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let client = SupabaseClient::new(&config.storage)?;
        let request = PageRequest::new(self.page, self.limit);

        let page = match client.list(request).await {
            Ok(page) => page,
            Err(e) => {
                let err = BundleError::from(e);
                eprintln!("Listing failed: {err}");
                return Ok(exit_code_for(&err));
            }
        };

        tracing::info!(
            page = page.page,
            returned = page.photos.len(),
            total = page.total,
            "Gallery page listed"
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&page)?);
        } else {
            print!("{}", render_page(&page));
        }
        Ok(exit_code::SUCCESS)
    }
}

/// Plain-text rendering: one photo per line, then a footer
pub fn render_page(page: &PhotoPage) -> String {
    let mut out = String::new();
    for photo in &page.photos {
        let _ = writeln!(
            out,
            "{}\t{}\t{}",
            photo.id,
            photo.created_at.format("%Y-%m-%d %H:%M:%S"),
            photo.display_name
        );
    }

    let pages = page.total.div_ceil(u64::from(page.limit)).max(1);
    let _ = write!(out, "Page {} of {pages} ({} photos)", page.page, page.total);
    if page.has_more {
        let _ = write!(out, ", next: --page {}", page.page + 1);
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PhotoId, PhotoRecord, StorageKey};
    use chrono::{TimeZone, Utc};

    fn photo(id: &str, name: &str) -> PhotoRecord {
        PhotoRecord::new(
            PhotoId::new(id).unwrap(),
            name,
            StorageKey::new(format!("{id}.jpg")).unwrap(),
            Utc.with_ymd_and_hms(2024, 9, 14, 18, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_render_page_with_more() {
        let page = PhotoPage::new(
            PageRequest::new(Some(1), Some(2)),
            vec![photo("5", "cake.jpg"), photo("4", "toast.jpg")],
            5,
        );
        let text = render_page(&page);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "5\t2024-09-14 18:30:00\tcake.jpg");
        assert_eq!(lines[1], "4\t2024-09-14 18:30:00\ttoast.jpg");
        assert_eq!(lines[2], "Page 1 of 3 (5 photos), next: --page 2");
    }

    #[test]
    fn test_render_empty_gallery() {
        let page = PhotoPage::new(PageRequest::default(), Vec::new(), 0);
        assert_eq!(render_page(&page), "Page 1 of 1 (0 photos)\n");
    }
}
