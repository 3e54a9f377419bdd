//! Index File
//!
//! Version header followed by append-only key records.
//!
//! ## Loading
//! The whole file is read once on open and replayed into a map. Replay stops
//! at the first record that is torn (crash mid-append), malformed, or points
//! past the end of the data file; the file is then truncated back to the end
//! of the last good record so later appends line up again.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::warn;

use crate::error::{Result, StoreError};

use super::codec;
use super::{LockedFile, ValueLocation};

/// Result of reading the index file on open
#[derive(Debug)]
pub enum IndexState {
    /// Zero-length file (new store, or a reset interrupted by a crash)
    Empty,

    /// Header could not be decoded
    Unreadable,

    /// Header names a different version
    VersionMismatch { found: String },

    /// Header matches; records were replayed
    Loaded(LoadedIndex),
}

/// Records replayed from a matching index file
#[derive(Debug, Default)]
pub struct LoadedIndex {
    /// Key → location, first record wins
    pub entries: HashMap<String, ValueLocation>,

    /// Bytes cut from the end of the file by tail repair
    pub repaired_bytes: u64,

    /// Records whose key was already present (ignored)
    pub duplicates: usize,
}

/// Handle on the index file of an open store
pub struct IndexFile {
    /// Locked file handle
    inner: LockedFile,
    /// Current file length (next append offset)
    len: u64,
    /// Length of the version header
    header_len: u64,
}

impl IndexFile {
    /// Open and lock the index file
    pub fn open(path: &Path) -> Result<Self> {
        let inner = LockedFile::open(path)?;
        let len = inner
            .file()
            .metadata()
            .map_err(|source| StoreError::Init {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        Ok(Self {
            inner,
            len,
            header_len: 0,
        })
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if the file holds no records (at most the header)
    pub fn has_no_records(&self) -> bool {
        self.len <= self.header_len
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Read the header and, if it matches `version`, replay all records
    ///
    /// Records ending past `data_len` are treated as the start of a damaged
    /// tail, see the module docs.
    pub fn load(&mut self, version: &str, data_len: u64) -> Result<IndexState> {
        if self.len == 0 {
            return Ok(IndexState::Empty);
        }

        let mut bytes = Vec::with_capacity(self.len as usize);
        let file = self.inner.file_mut();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut bytes)?;

        let mut cursor = bytes.as_slice();
        let found = match codec::get_string(&mut cursor) {
            Ok(Some(found)) => found,
            Ok(None) | Err(_) => return Ok(IndexState::Unreadable),
        };

        if found != version {
            return Ok(IndexState::VersionMismatch { found });
        }

        self.header_len = (bytes.len() - cursor.len()) as u64;

        let mut loaded = LoadedIndex::default();
        let mut pos = self.header_len as usize;

        while pos < bytes.len() {
            let mut cursor = &bytes[pos..];

            let record = match codec::decode_record(&mut cursor) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(path = %self.path().display(), offset = pos, "Torn record at end of index");
                    break;
                }
                Err(e) => {
                    warn!(path = %self.path().display(), offset = pos, error = %e, "Malformed index record");
                    break;
                }
            };

            if record.location.end() > data_len {
                warn!(
                    path = %self.path().display(),
                    key = %record.key,
                    end = record.location.end(),
                    data_len,
                    "Index record points past end of data file"
                );
                break;
            }

            if loaded.entries.contains_key(&record.key) {
                loaded.duplicates += 1;
            } else {
                loaded.entries.insert(record.key, record.location);
            }

            pos = bytes.len() - cursor.len();
        }

        if pos < bytes.len() {
            loaded.repaired_bytes = (bytes.len() - pos) as u64;
            self.truncate_to(pos as u64)?;
            warn!(
                path = %self.path().display(),
                repaired_bytes = loaded.repaired_bytes,
                "Truncated damaged index tail"
            );
        }

        Ok(IndexState::Loaded(loaded))
    }

    /// Truncate to zero and write a fresh header
    ///
    /// If the header write fails the file is cut back to empty and
    /// `needs_header` stays true until a later reset succeeds.
    pub fn reset(&mut self, version: &str) -> Result<()> {
        let header = codec::encode_header(version)?;

        let file = self.inner.file_mut();
        file.set_len(0)?;
        self.len = 0;
        self.header_len = 0;

        let written = file
            .seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&header));

        if let Err(e) = written {
            let _ = file.set_len(0);
            return Err(e.into());
        }

        self.len = header.len() as u64;
        self.header_len = self.len;
        Ok(())
    }

    /// True while the file holds no valid version header
    ///
    /// Records must not be appended in this state: the first one would be
    /// read back as the header.
    pub fn needs_header(&self) -> bool {
        self.header_len == 0
    }

    /// Append an already encoded record at the end of the file
    ///
    /// A failed write is rolled back to the previous length.
    pub fn append_record(&mut self, record: &[u8]) -> io::Result<()> {
        let file = self.inner.file_mut();
        let written = file
            .seek(SeekFrom::Start(self.len))
            .and_then(|_| file.write_all(record));

        if let Err(e) = written {
            let _ = file.set_len(self.len);
            return Err(e);
        }

        self.len += record.len() as u64;
        Ok(())
    }

    /// Shrink the file to `len` bytes (no-op if it is already shorter)
    pub fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        if len >= self.len {
            return Ok(());
        }
        self.inner.file().set_len(len)?;
        self.len = len;
        Ok(())
    }

    /// Flush file contents to disk
    pub fn sync(&self) -> io::Result<()> {
        self.inner.file().sync_data()
    }

    /// Unlock and close the file
    pub fn release(self) -> io::Result<()> {
        self.inner.release()
    }
}
