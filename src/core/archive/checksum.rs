//! Payload checksums recorded in the export manifest

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum of raw bytes
///
/// Returns a hex-encoded string (64 characters).
///
/// # Examples
///
/// ```
/// use photobundle::core::archive::checksum::sha256_hex;
///
/// let checksum = sha256_hex(b"photo bytes");
/// assert_eq!(checksum.len(), 64);
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    format!("{result:x}")
}

/// CRC-32 (IEEE) as stored in ZIP headers
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
