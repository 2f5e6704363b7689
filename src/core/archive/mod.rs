//! ZIP archive container
//!
//! - [`writer`] - streaming, append-only ZIP writer
//! - [`names`] - entry name sanitisation and collision handling
//! - [`reader`] - parser used to verify produced archives
//! - [`checksum`] - payload checksums

pub mod checksum;
pub mod names;
pub mod reader;
pub mod writer;

pub use names::EntryNamer;
pub use reader::{read_archive, ArchiveEntry};
pub use writer::{
    ArchiveStats, ArchiveWriter, CompressionMethod, EntryMeta, EntryReceipt, WriterState,
};
