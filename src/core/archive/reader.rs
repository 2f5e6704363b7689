//! Archive reader used to verify produced archives
//!
//! Walks the end record, the central directory and each local header,
//! inflates every entry and checks its size and CRC-32. Only the subset of
//! ZIP that [`super::ArchiveWriter`] emits (stored/deflated, no ZIP64, no
//! encryption) is supported.

use super::checksum::crc32;
use super::writer::{
    from_dos_datetime, CompressionMethod, CENTRAL_HEADER_SIGNATURE,
    END_OF_CENTRAL_DIRECTORY_SIGNATURE, LOCAL_HEADER_SIGNATURE,
};
use crate::domain::ArchiveError;
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use std::io::Read;

const EOCD_MIN_LEN: usize = 22;

/// Upper bound of the deflate expansion ratio
const MAX_DEFLATE_RATIO: usize = 1032;

/// One verified entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub crc32: u32,
    pub compressed_size: u64,
    pub method: CompressionMethod,
    pub modified: Option<DateTime<Utc>>,
}

/// Parse and verify a complete archive held in memory
///
/// Entries are returned in central directory order.
///
/// # Errors
///
/// Returns `ArchiveError::Corrupt` for any structural problem, an unknown
/// compression method, or a size/CRC mismatch.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let eocd = find_end_record(bytes)?;
    let count = usize::from(read_u16(bytes, eocd + 10)?);
    let directory_size = read_u32(bytes, eocd + 12)? as usize;
    let directory_offset = read_u32(bytes, eocd + 16)? as usize;

    if directory_offset + directory_size > eocd {
        return Err(corrupt("central directory overlaps end record"));
    }

    let mut entries = Vec::with_capacity(count);
    let mut pos = directory_offset;
    for index in 0..count {
        if read_u32(bytes, pos)? != CENTRAL_HEADER_SIGNATURE {
            return Err(corrupt(format!("bad central header signature for entry {index}")));
        }

        let method_code = read_u16(bytes, pos + 10)?;
        let method = CompressionMethod::from_code(method_code)
            .ok_or_else(|| corrupt(format!("unsupported compression method {method_code}")))?;
        let dos_time = read_u16(bytes, pos + 12)?;
        let dos_date = read_u16(bytes, pos + 14)?;
        let expected_crc = read_u32(bytes, pos + 16)?;
        let compressed_size = read_u32(bytes, pos + 20)? as usize;
        let size = read_u32(bytes, pos + 24)? as usize;
        let name_len = usize::from(read_u16(bytes, pos + 28)?);
        let extra_len = usize::from(read_u16(bytes, pos + 30)?);
        let comment_len = usize::from(read_u16(bytes, pos + 32)?);
        let local_offset = read_u32(bytes, pos + 42)? as usize;

        let name_bytes = slice(bytes, pos + 46, name_len)?;
        let name = String::from_utf8(name_bytes.to_vec())
            .map_err(|_| corrupt(format!("entry {index} name is not UTF-8")))?;
        pos += 46 + name_len + extra_len + comment_len;

        if read_u32(bytes, local_offset)? != LOCAL_HEADER_SIGNATURE {
            return Err(corrupt(format!("bad local header signature for '{name}'")));
        }
        let local_name_len = usize::from(read_u16(bytes, local_offset + 26)?);
        let local_extra_len = usize::from(read_u16(bytes, local_offset + 28)?);
        let data_start = local_offset + 30 + local_name_len + local_extra_len;
        let body = slice(bytes, data_start, compressed_size)?;

        let data = match method {
            CompressionMethod::Stored => body.to_vec(),
            CompressionMethod::Deflated => {
                // Never trust the declared size for allocation, and stop one
                // byte past it so an oversized stream fails the length check
                let mut out =
                    Vec::with_capacity(size.min(body.len().saturating_mul(MAX_DEFLATE_RATIO)));
                DeflateDecoder::new(body)
                    .take(size as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| corrupt(format!("cannot inflate '{name}': {e}")))?;
                out
            }
        };

        if data.len() != size {
            return Err(corrupt(format!(
                "'{name}' inflated to {} bytes, expected {size}",
                data.len()
            )));
        }
        let actual_crc = crc32(&data);
        if actual_crc != expected_crc {
            return Err(corrupt(format!(
                "'{name}' CRC mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
            )));
        }

        entries.push(ArchiveEntry {
            name,
            data,
            crc32: actual_crc,
            compressed_size: compressed_size as u64,
            method,
            modified: from_dos_datetime(dos_time, dos_date),
        });
    }

    Ok(entries)
}

/// Locate the end-of-central-directory record, allowing a trailing comment
fn find_end_record(bytes: &[u8]) -> Result<usize, ArchiveError> {
    if bytes.len() < EOCD_MIN_LEN {
        return Err(corrupt("archive is shorter than an end record"));
    }
    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    let lowest = bytes.len().saturating_sub(EOCD_MIN_LEN + u16::MAX as usize);
    (lowest..=bytes.len() - EOCD_MIN_LEN)
        .rev()
        .find(|&pos| bytes[pos..pos + 4] == signature)
        .ok_or_else(|| corrupt("end of central directory not found"))
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Result<&[u8], ArchiveError> {
    start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| corrupt(format!("truncated at offset {start}")))
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16, ArchiveError> {
    let raw = slice(bytes, pos, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32, ArchiveError> {
    let raw = slice(bytes, pos, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn corrupt(reason: impl Into<String>) -> ArchiveError {
    ArchiveError::Corrupt(reason.into())
}
