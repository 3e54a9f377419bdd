//! Data File
//!
//! Append-only file of raw values. Locations come from the index.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, StoreError};

use super::{LockedFile, ValueLocation, MAX_DATA_LEN};

/// Handle on the data file of an open store
pub struct DataFile {
    /// Locked file handle
    inner: LockedFile,
    /// Current file length (next append offset)
    len: u64,
}

impl DataFile {
    /// Open and lock the data file
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

        Ok(Self { inner, len })
    }

    /// Current length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Append a value at the end of the file and return where it landed
    ///
    /// Fails with `CapacityExceeded` before writing anything if the value
    /// would end past `MAX_DATA_LEN`. A failed write is rolled back to the
    /// previous length.
    pub fn append(&mut self, value: &[u8]) -> Result<ValueLocation> {
        let requested = self.len + value.len() as u64;
        if requested > MAX_DATA_LEN {
            return Err(StoreError::CapacityExceeded {
                requested,
                limit: MAX_DATA_LEN,
            });
        }

        let location = ValueLocation::new(self.len as u32, value.len() as u32);

        let file = self.inner.file_mut();
        let written = file
            .seek(SeekFrom::Start(self.len))
            .and_then(|_| file.write_all(value));

        if let Err(e) = written {
            // Don't leave a partial value behind the recorded length
            let _ = file.set_len(self.len);
            return Err(e.into());
        }

        self.len = requested;
        Ok(location)
    }

    /// Read exactly the bytes at `location`
    ///
    /// A location past the end of the file is an I/O error (`UnexpectedEof`),
    /// never a short read.
    pub fn read(&mut self, location: ValueLocation) -> io::Result<Vec<u8>> {
        let file = self.inner.file_mut();
        file.seek(SeekFrom::Start(u64::from(location.offset)))?;

        let mut value = vec![0u8; location.size as usize];
        file.read_exact(&mut value)?;

        Ok(value)
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
