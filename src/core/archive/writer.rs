//! Streaming ZIP writer
//!
//! Entries are written to the sink one at a time as they are appended: a
//! local file header followed by the (possibly deflated) payload. Only the
//! small per-entry central directory records are kept in memory until
//! [`ArchiveWriter::finalize`] writes the central directory and the
//! end-of-central-directory record.
//!
//! The writer is a state machine:
//!
//! ```text
//! Open --append--> Appending --append--> Appending
//!   |                  |
//!   +----finalize------+------> Finalized
//!
//! any sink failure ---------> Poisoned
//! ```
//!
//! `open` writes nothing, so a writer that is dropped before its first
//! append leaves the sink untouched.

use super::checksum::{crc32, sha256_hex};
use super::names::EntryNamer;
use crate::domain::ArchiveError;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub(crate) const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// General purpose flag bit 11: names are UTF-8
pub(crate) const FLAG_UTF8: u16 = 0x0800;

/// Most entries a classic (non-ZIP64) archive can index
pub const MAX_ENTRIES: usize = u16::MAX as usize;

/// Largest size or offset a classic archive can record
pub const MAX_SIZE: u64 = u32::MAX as u64;

const LOCAL_HEADER_LEN: usize = 30;
const CENTRAL_HEADER_LEN: usize = 46;
const EOCD_LEN: usize = 22;

/// Version made by: Unix, ZIP 2.0
const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// External attributes: regular file, rw-r--r--
const EXTERNAL_ATTRIBUTES: u32 = 0o100_644 << 16;

/// Lifecycle of an [`ArchiveWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Opened, nothing written yet
    Open,
    /// At least one entry written
    Appending,
    /// Central directory written; no further calls allowed
    Finalized,
    /// A sink write failed; the output is unusable
    Poisoned,
}

impl WriterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriterState::Open => "open",
            WriterState::Appending => "appending",
            WriterState::Finalized => "finalized",
            WriterState::Poisoned => "poisoned",
        }
    }
}

impl std::fmt::Display for WriterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage method of one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Stored,
    Deflated,
}

impl CompressionMethod {
    pub fn code(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(CompressionMethod::Stored),
            8 => Some(CompressionMethod::Deflated),
            _ => None,
        }
    }

    fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 10,
            CompressionMethod::Deflated => 20,
        }
    }
}

/// Naming and timestamp for one entry
#[derive(Debug, Clone)]
pub struct EntryMeta<'a> {
    /// Requested entry name, sanitised and disambiguated by the writer
    pub name: &'a str,
    /// Used when `name` sanitises to nothing usable
    pub fallback: &'a str,
    /// Modification time recorded in the headers
    pub modified: DateTime<Utc>,
}

/// What was written for one appended entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReceipt {
    /// Final (unique) name inside the archive
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Size of the stored body in bytes
    pub compressed_size: u64,
    /// CRC-32 of the uncompressed payload
    pub crc32: u32,
    /// Hex SHA-256 of the uncompressed payload
    pub sha256: String,
    /// How the body was stored
    pub method: CompressionMethod,
}

/// Totals reported by [`ArchiveWriter::finalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStats {
    pub entries: usize,
    pub bytes_written: u64,
}

#[derive(Debug)]
struct CentralRecord {
    name: String,
    method: CompressionMethod,
    dos_time: u16,
    dos_date: u16,
    crc32: u32,
    compressed_size: u32,
    size: u32,
    offset: u32,
}

/// Payload after compression, produced on the blocking pool
struct Encoded {
    crc32: u32,
    sha256: String,
    method: CompressionMethod,
    body: Bytes,
}

/// Append-only ZIP writer over an async sink
pub struct ArchiveWriter<W> {
    sink: W,
    state: WriterState,
    level: u32,
    offset: u64,
    central: Vec<CentralRecord>,
    namer: EntryNamer,
}

impl<W: AsyncWrite + Unpin + Send> ArchiveWriter<W> {
    /// Open a writer over `sink`
    ///
    /// `level` is the DEFLATE level (0-9, clamped); 0 stores every entry.
    /// Nothing is written until the first append.
    pub fn open(sink: W, level: u32) -> Self {
        Self {
            sink,
            state: WriterState::Open,
            level: level.min(9),
            offset: 0,
            central: Vec::new(),
            namer: EntryNamer::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Entries written so far
    pub fn entry_count(&self) -> usize {
        self.central.len()
    }

    /// Bytes emitted to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.offset
    }

    /// Append an entry named `name` with the DOS epoch as its timestamp
    pub async fn append(&mut self, name: &str, data: Bytes) -> Result<EntryReceipt, ArchiveError> {
        let fallback = format!("entry-{}", self.central.len() + 1);
        let meta = EntryMeta {
            name,
            fallback: &fallback,
            modified: dos_epoch(),
        };
        self.append_entry(meta, data).await
    }

    /// Append one entry and write it to the sink
    ///
    /// The entry is fully written before this returns; its payload is not
    /// retained.
    ///
    /// # Errors
    ///
    /// - `InvalidState` after `finalize` or a sink failure
    /// - `LimitExceeded` past 65 535 entries or 4 GiB
    /// - `SinkWrite` if the sink fails; the writer is then poisoned
    pub async fn append_entry(
        &mut self,
        meta: EntryMeta<'_>,
        data: Bytes,
    ) -> Result<EntryReceipt, ArchiveError> {
        self.ensure_writable("append")?;

        if self.central.len() >= MAX_ENTRIES {
            return Err(ArchiveError::LimitExceeded(format!(
                "archive already holds {MAX_ENTRIES} entries"
            )));
        }
        if data.len() as u64 > MAX_SIZE {
            return Err(ArchiveError::LimitExceeded(format!(
                "entry of {} bytes exceeds 4 GiB",
                data.len()
            )));
        }
        if self.offset > MAX_SIZE {
            return Err(ArchiveError::LimitExceeded(
                "archive offset exceeds 4 GiB".to_string(),
            ));
        }

        let name = self.namer.claim(meta.name, meta.fallback);
        if name.len() > u16::MAX as usize {
            return Err(ArchiveError::LimitExceeded(format!(
                "entry name of {} bytes is too long",
                name.len()
            )));
        }

        let size = data.len() as u64;
        let level = self.level;
        let encoded = tokio::task::spawn_blocking(move || encode(data, level))
            .await
            .map_err(|e| ArchiveError::Compression(format!("compression task failed: {e}")))?
            .map_err(|e| ArchiveError::Compression(e.to_string()))?;

        let (dos_time, dos_date) = dos_datetime(meta.modified);
        let record = CentralRecord {
            name,
            method: encoded.method,
            dos_time,
            dos_date,
            crc32: encoded.crc32,
            compressed_size: encoded.body.len() as u32,
            size: size as u32,
            offset: self.offset as u32,
        };

        let header = local_header(&record);
        self.write(&header).await?;
        self.write(&encoded.body).await?;
        self.offset += (header.len() + encoded.body.len()) as u64;

        tracing::trace!(
            name = %record.name,
            size = size,
            compressed_size = encoded.body.len(),
            method = ?encoded.method,
            "Archive entry written"
        );

        let receipt = EntryReceipt {
            name: record.name.clone(),
            size,
            compressed_size: encoded.body.len() as u64,
            crc32: encoded.crc32,
            sha256: encoded.sha256,
            method: encoded.method,
        };
        self.central.push(record);
        self.state = WriterState::Appending;
        Ok(receipt)
    }

    /// Write the central directory and end record, then flush
    ///
    /// Valid exactly once, from `Open` (empty archive) or `Appending`.
    pub async fn finalize(&mut self) -> Result<ArchiveStats, ArchiveError> {
        self.ensure_writable("finalize")?;

        let directory_offset = self.offset;
        if directory_offset > MAX_SIZE {
            return Err(ArchiveError::LimitExceeded(
                "central directory offset exceeds 4 GiB".to_string(),
            ));
        }

        let mut directory = Vec::with_capacity(
            self.central
                .iter()
                .map(|r| CENTRAL_HEADER_LEN + r.name.len())
                .sum::<usize>()
                + EOCD_LEN,
        );
        for record in &self.central {
            central_header(&mut directory, record);
        }
        let directory_size = directory.len() as u64;
        if directory_size > MAX_SIZE {
            return Err(ArchiveError::LimitExceeded(
                "central directory exceeds 4 GiB".to_string(),
            ));
        }

        let count = self.central.len() as u16;
        put_u32(&mut directory, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut directory, 0); // this disk
        put_u16(&mut directory, 0); // disk with central directory
        put_u16(&mut directory, count);
        put_u16(&mut directory, count);
        put_u32(&mut directory, directory_size as u32);
        put_u32(&mut directory, directory_offset as u32);
        put_u16(&mut directory, 0); // comment length

        self.write(&directory).await?;
        if let Err(e) = self.sink.flush().await {
            self.state = WriterState::Poisoned;
            return Err(ArchiveError::SinkWrite(e));
        }
        self.offset += directory.len() as u64;
        self.state = WriterState::Finalized;

        Ok(ArchiveStats {
            entries: self.central.len(),
            bytes_written: self.offset,
        })
    }

    /// Give back the sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<(), ArchiveError> {
        match self.state {
            WriterState::Open | WriterState::Appending => Ok(()),
            state => Err(ArchiveError::InvalidState {
                operation,
                state: state.as_str(),
            }),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), ArchiveError> {
        if let Err(e) = self.sink.write_all(buf).await {
            self.state = WriterState::Poisoned;
            return Err(ArchiveError::SinkWrite(e));
        }
        Ok(())
    }
}

fn encode(data: Bytes, level: u32) -> std::io::Result<Encoded> {
    let crc32 = crc32(&data);
    let sha256 = sha256_hex(&data);

    if level > 0 && !data.is_empty() {
        let mut encoder = DeflateEncoder::new(
            Vec::with_capacity(data.len() / 2),
            Compression::new(level),
        );
        encoder.write_all(&data)?;
        let compressed = encoder.finish()?;
        if compressed.len() < data.len() {
            return Ok(Encoded {
                crc32,
                sha256,
                method: CompressionMethod::Deflated,
                body: Bytes::from(compressed),
            });
        }
    }

    Ok(Encoded {
        crc32,
        sha256,
        method: CompressionMethod::Stored,
        body: data,
    })
}

fn local_header(record: &CentralRecord) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LOCAL_HEADER_LEN + record.name.len());
    put_u32(&mut buf, LOCAL_HEADER_SIGNATURE);
    put_u16(&mut buf, record.method.version_needed());
    put_u16(&mut buf, FLAG_UTF8);
    put_u16(&mut buf, record.method.code());
    put_u16(&mut buf, record.dos_time);
    put_u16(&mut buf, record.dos_date);
    put_u32(&mut buf, record.crc32);
    put_u32(&mut buf, record.compressed_size);
    put_u32(&mut buf, record.size);
    put_u16(&mut buf, record.name.len() as u16);
    put_u16(&mut buf, 0); // extra field length
    buf.extend_from_slice(record.name.as_bytes());
    buf
}

fn central_header(buf: &mut Vec<u8>, record: &CentralRecord) {
    put_u32(buf, CENTRAL_HEADER_SIGNATURE);
    put_u16(buf, VERSION_MADE_BY);
    put_u16(buf, record.method.version_needed());
    put_u16(buf, FLAG_UTF8);
    put_u16(buf, record.method.code());
    put_u16(buf, record.dos_time);
    put_u16(buf, record.dos_date);
    put_u32(buf, record.crc32);
    put_u32(buf, record.compressed_size);
    put_u32(buf, record.size);
    put_u16(buf, record.name.len() as u16);
    put_u16(buf, 0); // extra field length
    put_u16(buf, 0); // comment length
    put_u16(buf, 0); // disk number start
    put_u16(buf, 0); // internal attributes
    put_u32(buf, EXTERNAL_ATTRIBUTES);
    put_u32(buf, record.offset);
    buf.extend_from_slice(record.name.as_bytes());
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// 1980-01-01T00:00:00Z, the earliest DOS timestamp
pub fn dos_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(315_532_800, 0).unwrap_or_default()
}

/// Encode a timestamp as DOS (time, date), clamped to 1980..=2107
///
/// DOS time has two-second resolution.
pub fn dos_datetime(ts: DateTime<Utc>) -> (u16, u16) {
    if ts.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if ts.year() > 2107 {
        return (
            (23 << 11) | (59 << 5) | (58 / 2),
            ((2107 - 1980) << 9) | (12 << 5) | 31,
        );
    }

    let time = ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | (ts.second() as u16 / 2);
    let date =
        (((ts.year() - 1980) as u16) << 9) | ((ts.month() as u16) << 5) | ts.day() as u16;
    (time, date)
}

/// Decode a DOS (time, date) pair
pub fn from_dos_datetime(time: u16, date: u16) -> Option<DateTime<Utc>> {
    let year = 1980 + i32::from(date >> 9);
    let month = u32::from((date >> 5) & 0x0f);
    let day = u32::from(date & 0x1f);
    let hour = u32::from(time >> 11);
    let minute = u32::from((time >> 5) & 0x3f);
    let second = u32::from(time & 0x1f) * 2;

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|naive| naive.and_utc())
}
