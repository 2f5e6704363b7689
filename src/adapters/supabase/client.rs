//! HTTP client for the managed storage + REST catalog backend

use super::models::PhotoRow;
use crate::adapters::traits::{CatalogLookup, ObjectReader};
use crate::config::{RetryConfig, SecretString, StorageConfig};
use crate::domain::{
    BundleError, CatalogError, ObjectReadError, PageRequest, PhotoId, PhotoPage, PhotoRecord,
    Result, StorageKey,
};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// IDs per catalog query, keeps the `in.(...)` filter well under URL limits
const CATALOG_CHUNK_SIZE: usize = 100;

/// Client for a Supabase-style backend
///
/// Implements both [`CatalogLookup`] (REST table queries) and
/// [`ObjectReader`] (authenticated storage downloads).
///
/// # Example
///
/// ```no_run
/// use photobundle::adapters::supabase::SupabaseClient;
/// use photobundle::config::{secret_string, RetryConfig, StorageConfig};
///
/// # fn example() -> photobundle::domain::Result<()> {
/// let config = StorageConfig {
///     base_url: "https://project.supabase.co".to_string(),
///     api_key: secret_string("service-role-key".to_string()),
///     bucket: "photos".to_string(),
///     table: "photos".to_string(),
///     timeout_seconds: 60,
///     connect_timeout_seconds: 30,
///     retry: RetryConfig::default(),
/// };
/// let client = SupabaseClient::new(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct SupabaseClient {
    /// HTTP client for making requests
    client: Client,

    /// Base URL of the project
    base_url: Url,

    /// API key sent with every request
    api_key: SecretString,

    /// Storage bucket name
    bucket: String,

    /// Catalog table name
    table: String,

    /// Request timeout, reported on timed-out reads
    timeout: Duration,

    /// Retry policy for catalog queries
    retry: RetryConfig,
}

impl SupabaseClient {
    /// Create a new client from storage configuration
    ///
    /// # Errors
    ///
    /// Returns `BundleError::Configuration` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base).map_err(|e| {
            BundleError::Configuration(format!("Invalid storage.base_url '{}': {e}", config.base_url))
        })?;

        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = ClientBuilder::new()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| BundleError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        tracing::debug!(
            base_url = %base_url,
            bucket = %config.bucket,
            table = %config.table,
            "Storage client created"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            bucket: config.bucket.clone(),
            table: config.table.clone(),
            timeout,
            retry: config.retry.clone(),
        })
    }

    /// Attach the API key headers
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let key: &str = self.api_key.expose_secret().as_ref();
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
    }

    /// URL of a single object in the bucket
    fn object_url(&self, key: &StorageKey) -> std::result::Result<Url, ObjectReadError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ObjectReadError::Io("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", self.bucket.as_str()])
            .extend(key.segments());
        Ok(url)
    }

    /// URL of a catalog query for one chunk of IDs
    fn catalog_url(&self, ids: &[PhotoId]) -> std::result::Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::Unavailable("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);

        let list = ids
            .iter()
            .map(|id| quote_filter_value(id.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut()
            .append_pair("select", "id,file_name,file_url,created_at")
            .append_pair("id", &format!("in.({list})"));
        Ok(url)
    }

    /// Query one chunk of IDs without retrying
    async fn query_chunk(&self, ids: &[PhotoId]) -> std::result::Result<Vec<PhotoRow>, CatalogError> {
        let url = self.catalog_url(ids)?;
        let resp = self
            .authorized(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Unavailable(format!(
                "catalog query failed with status {status}: {body}"
            )));
        }

        resp.json::<Vec<PhotoRow>>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }

    /// URL of one page of the whole catalog, newest first
    fn listing_url(&self) -> std::result::Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::Unavailable("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", self.table.as_str()]);
        url.query_pairs_mut()
            .append_pair("select", "id,file_name,file_url,created_at")
            .append_pair("order", "created_at.desc");
        Ok(url)
    }

    /// Fetch one listing page without retrying
    ///
    /// The row window travels in the `Range` header and the exact total comes
    /// back in `Content-Range`.
    async fn query_page(
        &self,
        page: PageRequest,
    ) -> std::result::Result<(Vec<PhotoRow>, u64), CatalogError> {
        let url = self.listing_url()?;
        let resp = self
            .authorized(self.client.get(url))
            .header("Accept", "application/json")
            .header("Range-Unit", "items")
            .header("Range", format!("{}-{}", page.offset(), page.last()))
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let status = resp.status();
        let total = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        // Asking for rows past the end is not an error, just an empty page
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok((Vec::new(), total.unwrap_or(0)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Unavailable(format!(
                "catalog listing failed with status {status}: {body}"
            )));
        }

        let rows = resp
            .json::<Vec<PhotoRow>>()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        let total = total.ok_or_else(|| {
            CatalogError::InvalidResponse("listing response carries no total count".to_string())
        })?;
        Ok((rows, total))
    }

    /// Run a catalog request with exponential backoff
    ///
    /// Only `Unavailable` is retried; a malformed response will not improve.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut run: F,
    ) -> std::result::Result<T, CatalogError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, CatalogError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match run().await {
                Ok(value) => return Ok(value),
                Err(e @ CatalogError::InvalidResponse(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(e);
                    }

                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        operation = operation,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying catalog request after error"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Convert rows, skipping the ones that yield no usable record
    fn rows_to_records(&self, rows: Vec<PhotoRow>) -> Vec<PhotoRecord> {
        rows.into_iter()
            .filter_map(|row| match row.into_record(&self.bucket) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unusable catalog row");
                    None
                }
            })
            .collect()
    }
}

/// Total row count from a `Content-Range` value such as `0-19/57` or `*/57`
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Quote a value for a PostgREST `in.(...)` list when it contains reserved
/// characters
fn quote_filter_value(value: &str) -> String {
    if value.contains([',', '(', ')', '"', '\\', ' ']) {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

/// Storage answers a missing object with 404, or with 400 and a not-found body
fn is_not_found(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }
    let body = body.to_ascii_lowercase();
    status == StatusCode::BAD_REQUEST && (body.contains("not_found") || body.contains("not found"))
}

#[async_trait]
impl CatalogLookup for SupabaseClient {
    async fn resolve(&self, ids: &[PhotoId]) -> std::result::Result<Vec<PhotoRecord>, CatalogError> {
        let mut unique: Vec<PhotoId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        let mut records = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(CATALOG_CHUNK_SIZE) {
            let rows = self
                .with_retry("resolve", || self.query_chunk(chunk))
                .await?;
            tracing::debug!(
                requested = chunk.len(),
                returned = rows.len(),
                "Catalog chunk resolved"
            );
            records.extend(self.rows_to_records(rows));
        }

        Ok(records)
    }

    async fn list(&self, page: PageRequest) -> std::result::Result<PhotoPage, CatalogError> {
        let (rows, total) = self.with_retry("list", || self.query_page(page)).await?;
        tracing::debug!(
            page = page.page(),
            limit = page.limit(),
            returned = rows.len(),
            total = total,
            "Catalog page listed"
        );
        Ok(PhotoPage::new(page, self.rows_to_records(rows), total))
    }
}

#[async_trait]
impl ObjectReader for SupabaseClient {
    async fn read(&self, key: &StorageKey) -> std::result::Result<Bytes, ObjectReadError> {
        let url = self.object_url(key)?;

        let resp = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ObjectReadError::Timeout(self.timeout)
                } else {
                    ObjectReadError::Io(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_not_found(status, &body) {
                return Err(ObjectReadError::NotFound(key.to_string()));
            }
            return Err(ObjectReadError::Io(format!(
                "storage download failed with status {status}: {body}"
            )));
        }

        resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ObjectReadError::Timeout(self.timeout)
            } else {
                ObjectReadError::Io(e.to_string())
            }
        })
    }
}
