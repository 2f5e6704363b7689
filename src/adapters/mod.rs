//! External system integrations for photobundle.
//!
//! - [`traits`] - the two collaborator contracts the pipeline consumes
//! - [`supabase`] - managed backend: REST catalog plus object storage
//! - [`memory`] - in-memory catalog and object store for tests
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with mock implementations. The pipeline only ever holds
//! `Arc<dyn CatalogLookup>` and `Arc<dyn ObjectReader>`.
//!
//! ```rust,no_run
//! use photobundle::adapters::supabase::SupabaseClient;
//! use photobundle::adapters::{CatalogLookup, ObjectReader};
//! use photobundle::config::{secret_string, RetryConfig, StorageConfig};
//! use photobundle::domain::PhotoId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig {
//!     base_url: "https://project.supabase.co".to_string(),
//!     api_key: secret_string("service-key".to_string()),
//!     bucket: "photos".to_string(),
//!     table: "photos".to_string(),
//!     timeout_seconds: 60,
//!     connect_timeout_seconds: 30,
//!     retry: RetryConfig::default(),
//! };
//!
//! let client = SupabaseClient::new(&config)?;
//! let records = client.resolve(&[PhotoId::new("42")?]).await?;
//! for record in &records {
//!     let bytes = client.read(&record.storage_key).await?;
//!     println!("{}: {} bytes", record.display_name, bytes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod supabase;
pub mod traits;

pub use traits::{CatalogLookup, ObjectReader};
