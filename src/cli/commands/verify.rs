//! Verify command implementation
//!
//! Parses a ZIP archive, inflates every entry and checks its CRC-32.

use crate::cli::exit_code;
use crate::core::archive::checksum::sha256_hex;
use crate::core::archive::read_archive;
use clap::Args;

/// Arguments for the verify command
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Archive to verify
    pub archive: String,

    /// Print the SHA-256 of every entry
    #[arg(long)]
    pub checksums: bool,
}

impl VerifyArgs {
    /// Execute the verify command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(archive = %self.archive, "Verifying archive");

        let bytes = match tokio::fs::read(&self.archive).await {
            Ok(b) => b,
            Err(e) => {
                println!("❌ Failed to read {}: {e}", self.archive);
                return Ok(exit_code::FATAL);
            }
        };

        let entries = match read_archive(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                println!("❌ Archive is not valid: {e}");
                return Ok(exit_code::FATAL);
            }
        };

        println!("✅ {} is valid ({} entries)", self.archive, entries.len());
        for entry in &entries {
            if self.checksums {
                println!(
                    "  {}  {} ({} bytes)",
                    sha256_hex(&entry.data),
                    entry.name,
                    entry.data.len()
                );
            } else {
                println!(
                    "  {} ({} bytes, {:?})",
                    entry.name,
                    entry.data.len(),
                    entry.method
                );
            }
        }

        Ok(exit_code::SUCCESS)
    }
}
