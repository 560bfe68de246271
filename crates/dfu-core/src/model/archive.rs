//! Update package handles and on-disk validation.
//!
//! A DFU package is a ZIP archive (manifest plus init packet and firmware
//! images). Only the container is checked here; the contents are the
//! transfer engine's business.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use thiserror::Error;
use tracing::{debug, instrument};

/// ZIP local file header signature ("PK\x03\x04").
pub const ZIP_LOCAL_HEADER_SIG: u32 = 0x0403_4B50;
/// ZIP end of central directory signature, first record of an empty archive.
pub const ZIP_EMPTY_ARCHIVE_SIG: u32 = 0x0605_4B50;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive not readable: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive is empty")]
    Empty,

    #[error("Archive has no entries")]
    NoEntries,

    #[error("Not a ZIP archive: signature 0x{found:08X}")]
    NotZip { found: u32 },
}

/// An accepted update package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    /// Reference the user selected.
    pub uri: String,
    /// Display name (last path segment).
    pub name: String,
    /// Size in bytes, 0 when unknown.
    pub size: u64,
}

impl ArchiveHandle {
    pub fn new(uri: impl Into<String>, size: u64) -> Self {
        let uri = uri.into();
        let name = uri
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&uri)
            .to_string();
        Self { uri, name, size }
    }
}

impl std::fmt::Display for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.name, self.size)
    }
}

/// Open `path` and check that it looks like a non-empty ZIP package.
#[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn probe_archive<P: AsRef<Path>>(path: P) -> Result<ArchiveHandle, ArchiveError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Err(ArchiveError::Empty);
    }
    if size < 4 {
        return Err(ArchiveError::NotZip { found: 0 });
    }

    let mut reader = BufReader::new(file);
    let signature = reader.read_u32::<LittleEndian>()?;
    debug!(signature = %format!("0x{:08X}", signature), size, "Read archive signature");

    match signature {
        ZIP_LOCAL_HEADER_SIG => Ok(ArchiveHandle::new(path.to_string_lossy(), size)),
        ZIP_EMPTY_ARCHIVE_SIG => Err(ArchiveError::NoEntries),
        found => Err(ArchiveError::NotZip { found }),
    }
}
