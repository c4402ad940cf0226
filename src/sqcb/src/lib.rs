//! SQCB bank reader
//!
//! SQCB banks pack game assets into a single file that can only be read front
//! to back. Entries are extracted in table order from any `Read` source; no
//! seeking is required.
//!
//! # Format Overview
//!
//! All integers are little-endian.
//! - Header tag: `"SQCB"`
//! - Version tag: `"1.00"`
//! - Bytes 8-11: Record count
//! - Record table, repeated count times:
//!   - Name: 16-bit code units, terminated by a zero unit
//!   - Offset (u32): absolute position of the payload in the bank
//!   - Size (u32): payload length in bytes
//! - Payloads, concatenated in table order right after the table
//!
//! Tags are single-byte characters by default. Banks written by older
//! tooling store them as 16-bit units instead, see [`TagWidth`].
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("textures.sqcb")?);
//! let mut bank = sqcb::Bank::new(file);
//! while bank.has_next()? {
//!     let mut entry = bank.next()?;
//!     let mut out = File::create(entry.name().to_string_lossy())?;
//!     std::io::copy(&mut entry, &mut out)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bank;
mod decoder;
pub mod io;
mod record;
pub mod unpack;

use std::path::PathBuf;

#[cfg(test)]
pub(crate) mod fixture;

pub use bank::{Bank, Entry};
pub use decoder::{read_table, TagWidth};
pub use io::{BoundedReader, CountingReader};
pub use record::{Record, RecordName};
pub use unpack::{
    find_containers, is_container, resolve_entry_path, Listener, LogListener, Unpacker,
    DEFAULT_BUFFER_SIZE,
};

/// Header tag: "SQCB"
pub const HEADER: &[u8; 4] = b"SQCB";

/// Version tag: "1.00"
pub const VERSION: &[u8; 4] = b"1.00";

/// File extension of SQCB banks
pub const EXTENSION: &str = "sqcb";

/// Error classes a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The byte source failed or ended in the middle of a field
    Io,
    /// The data is not an SQCB bank
    Format,
    /// The table disagrees with the real byte layout
    Consistency,
    /// The session was used incorrectly
    IllegalState,
    /// An entry or bank has no safe place on disk
    Destination,
}

/// Errors from SQCB bank reading
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of stream while reading {field}")]
    Truncated { field: &'static str },

    #[error("Invalid header: expected 'SQCB', got {0:?}")]
    InvalidHeader(String),

    #[error("Invalid version: expected '1.00', got {0:?}")]
    InvalidVersion(String),

    #[error("Broken file: entry '{name}' declared at offset {expected}, stream is at {actual}")]
    BrokenFile {
        name: String,
        expected: u32,
        actual: u64,
    },

    #[error("No more entries in bank")]
    Exhausted,

    #[error("Bank session already failed")]
    Failed,

    #[error("Entry name does not resolve to a relative path: {0:?}")]
    InvalidEntryName(String),

    #[error("Entry would overwrite the bank being unpacked: {}", .0.display())]
    OverwritesSource(PathBuf),

    #[error("Destination {} is already used by {}", .dest.display(), .other.display())]
    DuplicateDestination { dest: PathBuf, other: PathBuf },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::Truncated { .. } => ErrorKind::Io,
            Error::InvalidHeader(_) | Error::InvalidVersion(_) => ErrorKind::Format,
            Error::BrokenFile { .. } => ErrorKind::Consistency,
            Error::Exhausted | Error::Failed => ErrorKind::IllegalState,
            Error::InvalidEntryName(_)
            | Error::OverwritesSource(_)
            | Error::DuplicateDestination { .. } => ErrorKind::Destination,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
