//! Managed backend adapter
//!
//! Photos live in a storage bucket; their metadata rows live in a REST
//! table whose `file_url` column holds the object's public URL.

pub mod client;
pub mod models;

pub use client::SupabaseClient;
pub use models::{storage_key_from_url, PhotoRow};
