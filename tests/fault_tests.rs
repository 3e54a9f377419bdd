//! Tests for write failures in the middle of an operation
//!
//! Failures are injected with a file size limit (`RLIMIT_FSIZE`, SIGXFSZ
//! ignored), so writes past the limit fail with `EFBIG`.
//!
//! These tests verify:
//! - A failed put leaves both files and the map as they were
//! - A failed clear never lets a later put land where the header belongs
//! - The store stays usable once writes succeed again

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use appendkv::storage::{DATA_FILE_NAME, INDEX_FILE_NAME};
use appendkv::{Store, StoreError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// The limit is process-wide; tests in this file take turns
static FSIZE_LOCK: Mutex<()> = Mutex::new(());

/// Lowers the soft file size limit until dropped
struct FileSizeLimit {
    previous: libc::rlimit,
    _serial: MutexGuard<'static, ()>,
}

impl FileSizeLimit {
    fn set(bytes: u64) -> Self {
        let serial = FSIZE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let mut previous = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        unsafe {
            libc::signal(libc::SIGXFSZ, libc::SIG_IGN);
            assert_eq!(libc::getrlimit(libc::RLIMIT_FSIZE, &mut previous), 0);

            let limited = libc::rlimit {
                rlim_cur: bytes as libc::rlim_t,
                rlim_max: previous.rlim_max,
            };
            assert_eq!(libc::setrlimit(libc::RLIMIT_FSIZE, &limited), 0);
        }

        Self {
            previous,
            _serial: serial,
        }
    }
}

impl Drop for FileSizeLimit {
    fn drop(&mut self) {
        unsafe {
            libc::setrlimit(libc::RLIMIT_FSIZE, &self.previous);
        }
    }
}

fn file_len(root: &Path, name: &str) -> u64 {
    fs::metadata(root.join(name)).unwrap().len()
}

// =============================================================================
// Put Rollback Tests
// =============================================================================

#[test]
fn test_put_rolls_back_failed_data_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let store = Store::open_path(root, "1").unwrap();
    store.put("a", b"aaa").unwrap();
    let index_len = file_len(root, INDEX_FILE_NAME);

    {
        let _limit = FileSizeLimit::set(1024);
        let err = store.put("big", &vec![7u8; 200_000]).err().unwrap();
        assert!(matches!(err, StoreError::Io(_)), "got {:?}", err);
    }

    assert_eq!(store.contains("big"), Some(false));
    assert_eq!(file_len(root, DATA_FILE_NAME), 3);
    assert_eq!(file_len(root, INDEX_FILE_NAME), index_len);

    store.put("b", b"bbb").unwrap();
    store.close();

    let store = Store::open_path(root, "1").unwrap();
    assert_eq!(store.keys(), Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(store.get("b").unwrap(), Some(b"bbb".to_vec()));
}

#[test]
fn test_put_rolls_back_failed_index_write() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let store = Store::open_path(root, "1").unwrap();
    store.put("a", b"aaa").unwrap();
    let index_len = file_len(root, INDEX_FILE_NAME);

    // Value fits under the limit, its index record does not
    let long_key = "k".repeat(5_000);
    {
        let _limit = FileSizeLimit::set(4096);
        let err = store.put(&long_key, b"v").err().unwrap();
        assert!(matches!(err, StoreError::Io(_)), "got {:?}", err);
    }

    assert_eq!(store.contains(&long_key), Some(false));
    assert_eq!(file_len(root, DATA_FILE_NAME), 3);
    assert_eq!(file_len(root, INDEX_FILE_NAME), index_len);
    store.close();

    let store = Store::open_path(root, "1").unwrap();
    assert_eq!(store.keys(), Some(vec!["a".to_string()]));
}

// =============================================================================
// Failed Clear Tests
// =============================================================================

#[test]
fn test_put_after_failed_clear_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    // Header alone is larger than the limit below
    let version = "v".repeat(60_000);

    let store = Store::open_path(root, &version).unwrap();
    store.put("old", b"1").unwrap();

    {
        let _limit = FileSizeLimit::set(30_000);

        let err = store.clear().err().unwrap();
        assert!(matches!(err, StoreError::Io(_)), "got {:?}", err);
        assert_eq!(store.size(), Some(0));

        // The header still cannot be written, so neither can the record
        assert!(store.put("new", b"acknowledged").is_err());
        assert_eq!(store.contains("new"), Some(false));
    }

    assert_eq!(file_len(root, INDEX_FILE_NAME), 0);

    store.put("new", b"acknowledged").unwrap();
    assert_eq!(store.get("new").unwrap(), Some(b"acknowledged".to_vec()));
    store.close();

    let store = Store::open_path(root, &version).unwrap();
    assert_eq!(store.keys(), Some(vec!["new".to_string()]));
    assert_eq!(store.get("new").unwrap(), Some(b"acknowledged".to_vec()));
}

#[test]
fn test_reopen_after_failed_clear() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let version = "v".repeat(60_000);

    let store = Store::open_path(root, &version).unwrap();
    store.put("old", b"1").unwrap();

    {
        let _limit = FileSizeLimit::set(30_000);
        assert!(store.clear().is_err());
    }
    store.close();

    let store = Store::open_path(root, &version).unwrap();
    assert_eq!(store.size(), Some(0));
    assert_eq!(file_len(root, DATA_FILE_NAME), 0);
}
