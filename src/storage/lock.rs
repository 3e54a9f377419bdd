//! Locked files
//!
//! Opens a file for read/write and takes an exclusive advisory lock on it.
//! The lock is never waited for: a second opener fails immediately.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, StoreError};

/// A read/write file handle holding an exclusive advisory lock
///
/// The lock is released by [`LockedFile::release`] or when the handle is
/// dropped (closing the descriptor drops the lock).
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Open (creating if absent) and lock the file at `path`
    ///
    /// Returns `StoreError::Locked` if another handle holds the lock, and
    /// `StoreError::Init` for any other failure.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| StoreError::Init {
                path: path.to_path_buf(),
                source,
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if is_contended(&e) => {
                return Err(StoreError::Locked {
                    path: path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(StoreError::Init {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and close the file
    pub fn release(self) -> io::Result<()> {
        FileExt::unlock(&self.file)
    }
}

/// True if `err` means "somebody else holds the lock"
fn is_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    let contended = fs2::lock_contended_error();
    err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error()
}
