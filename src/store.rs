//! Store Module
//!
//! The append-only key-value store that coordinates all components.
//!
//! ## Responsibilities
//! - Open/lock the index and data files, reset them on version mismatch
//! - Keep the in-memory index in step with the index file
//! - Append values (first write wins) and read them back
//! - Notify listeners of puts and clears
//! - Stay usable after `close`: every call becomes a harmless no-op

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{StoreConfig, SyncStrategy};
use crate::error::{Result, StoreError};
use crate::listener::{ChangeEvent, ChangeListener, ListenerRegistry};
use crate::object;
use crate::storage::codec;
use crate::storage::{
    DataFile, IndexFile, IndexState, ValueLocation, DATA_FILE_NAME, INDEX_FILE_NAME,
};

/// A file-backed, append-only map from string keys to byte values
///
/// ## Concurrency Model: one store-wide lock
///
/// Every operation holds `state` for its full duration, so puts, gets and
/// clears are serialized. The mutex is reentrant so that listeners, which
/// run while it is held, can read the store that notified them. The
/// `RefCell` inside is only borrowed for the mutation itself and released
/// before listeners run.
///
/// At most one `Store` per root directory exists at a time, across
/// processes too: both files carry an exclusive advisory lock while open.
pub struct Store {
    /// Store configuration
    config: StoreConfig,

    /// Files + in-memory index
    state: ReentrantMutex<RefCell<StoreState>>,

    /// Registered change listeners
    listeners: ListenerRegistry,
}

struct StoreState {
    /// Open files, `None` once closed
    files: Option<StoreFiles>,

    /// Mirror of the committed index records
    index: HashMap<String, ValueLocation>,

    /// Puts since the last sync (for `SyncStrategy::EveryNEntries`)
    unsynced: usize,
}

struct StoreFiles {
    index: IndexFile,
    data: DataFile,
}

impl StoreFiles {
    /// Data first, so a synced index record never points at unsynced data
    fn sync(&self) -> io::Result<()> {
        self.data.sync()?;
        self.index.sync()
    }

    /// Bring both files back to empty (index keeps only the header)
    ///
    /// The index goes first: a crash in between leaves either an empty
    /// index (reset again on open) or orphaned data bytes, never a record
    /// pointing at missing data.
    fn reset(&mut self, version: &str) -> Result<()> {
        self.index.reset(version)?;
        self.data.truncate_to(0)?;
        Ok(())
    }

    /// Undo a partially applied put
    fn rollback(&mut self, index_len: u64, data_len: u64) {
        if let Err(e) = self.index.truncate_to(index_len) {
            debug!(error = %e, "Failed to roll back index file");
        }
        if let Err(e) = self.data.truncate_to(data_len) {
            debug!(error = %e, "Failed to roll back data file");
        }
    }

    /// Sync, unlock and close both files, ignoring errors
    fn release(self) {
        if let Err(e) = self.sync() {
            debug!(error = %e, "Sync on close failed");
        }
        if let Err(e) = self.index.release() {
            debug!(error = %e, "Releasing index file failed");
        }
        if let Err(e) = self.data.release() {
            debug!(error = %e, "Releasing data file failed");
        }
    }
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the root directory
    /// 2. Open and lock the index file, then the data file
    /// 3. Replay the index if its version matches, otherwise reset both files
    ///
    /// Files opened before a failure are closed (and unlocked) before the
    /// error is returned.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let root = config.root_dir.as_path();

        // Step 1: Reject a version tag that cannot be written as a header
        codec::check_string(&config.version)?;

        // Step 2: Create root directory if it doesn't exist
        fs::create_dir_all(root).map_err(|source| StoreError::Init {
            path: root.to_path_buf(),
            source,
        })?;

        // Step 3: Open and lock both files
        let index = IndexFile::open(&root.join(INDEX_FILE_NAME))?;
        let data = DataFile::open(&root.join(DATA_FILE_NAME))?;
        let mut files = StoreFiles { index, data };

        // Step 4: Reconcile the index with the requested version
        let data_len = files.data.len();
        let entries = match files.index.load(&config.version, data_len)? {
            IndexState::Loaded(loaded) => {
                debug!(
                    root = %root.display(),
                    entries = loaded.entries.len(),
                    duplicates = loaded.duplicates,
                    repaired_bytes = loaded.repaired_bytes,
                    "Loaded store"
                );
                loaded.entries
            }
            IndexState::Empty => {
                debug!(root = %root.display(), "Initializing store");
                files.reset(&config.version)?;
                HashMap::new()
            }
            IndexState::Unreadable => {
                warn!(root = %root.display(), "Index header unreadable, resetting store");
                files.reset(&config.version)?;
                HashMap::new()
            }
            IndexState::VersionMismatch { found } => {
                info!(
                    root = %root.display(),
                    old_version = %found,
                    new_version = %config.version,
                    "Store content outdated, resetting"
                );
                files.reset(&config.version)?;
                HashMap::new()
            }
        };

        Ok(Self {
            config,
            state: ReentrantMutex::new(RefCell::new(StoreState {
                files: Some(files),
                index: entries,
                unsynced: 0,
            })),
            listeners: ListenerRegistry::new(),
        })
    }

    /// Open with a root directory and version (convenience method)
    ///
    /// Uses default config otherwise
    pub fn open_path(root: &Path, version: &str) -> Result<Self> {
        let config = StoreConfig::builder()
            .root_dir(root)
            .version(version)
            .build();
        Self::open(config)
    }

    /// Delete the files of a store that is not open
    ///
    /// Missing files are not an error. The root directory itself is kept.
    pub fn destroy(root: &Path) -> Result<()> {
        for name in [INDEX_FILE_NAME, DATA_FILE_NAME] {
            let path = root.join(name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to delete store file");
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `value` under `key`
    ///
    /// - closed store: `Ok(())`, nothing happens
    /// - key already present: `Ok(())`, the stored value is kept
    /// - otherwise the value is appended and listeners are notified
    ///
    /// Fails with `InvalidArgument` for a key too long to encode. On an I/O
    /// failure the files are rolled back and the store remains usable.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        codec::check_string(key)?;

        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            let state = &mut *state;

            let Some(files) = state.files.as_mut() else {
                debug!(key, "Put on closed store ignored");
                return Ok(());
            };

            if state.index.contains_key(key) {
                debug!(key, "Key already present, put ignored");
                return Ok(());
            }

            let sync_now = match self.config.sync_strategy {
                SyncStrategy::EveryWrite => true,
                SyncStrategy::EveryNEntries { count } => state.unsynced + 1 >= count,
                SyncStrategy::OsManaged => false,
            };

            let appended = Self::append(files, &self.config.version, key, value, sync_now);
            let location = match appended {
                Ok(location) => location,
                Err(e) => {
                    error!(
                        root = %self.root_dir().display(),
                        key,
                        error = %e,
                        "Error adding value to store"
                    );
                    return Err(e);
                }
            };

            state.index.insert(key.to_string(), location);
            state.unsynced = if sync_now { 0 } else { state.unsynced + 1 };
        }

        self.listeners.notify(&ChangeEvent::put(self, key, value));
        Ok(())
    }

    /// Data then index record then (optionally) sync; rolled back on failure
    ///
    /// An index left without a header by a failed clear gets it back first.
    fn append(
        files: &mut StoreFiles,
        version: &str,
        key: &str,
        value: &[u8],
        sync_now: bool,
    ) -> Result<ValueLocation> {
        if files.index.needs_header() {
            files.index.reset(version)?;
        }

        let index_len = files.index.len();
        let data_len = files.data.len();

        let location = files.data.append(value)?;

        let result = codec::encode_record(key, location)
            .and_then(|record| Ok(files.index.append_record(&record)?))
            .and_then(|()| if sync_now { Ok(files.sync()?) } else { Ok(()) });

        if let Err(e) = result {
            files.rollback(index_len, data_len);
            return Err(e);
        }

        Ok(location)
    }

    /// Serialize `value` and store it under `key`
    ///
    /// Fails with `InvalidArgument` (store untouched) if `value` cannot be
    /// serialized. `None` is a valid value: storing it makes `contains`
    /// report the key while `get_object::<Option<_>>` yields `Some(None)`.
    pub fn put_object<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = object::serialize(value).map_err(|e| {
            StoreError::InvalidArgument(format!("value is not serializable: {}", e))
        })?;
        self.put(key, &bytes)
    }

    /// Remove every entry
    ///
    /// Truncates the data file and rewrites the index file with only the
    /// version header, then notifies listeners with a cleared event.
    /// No-op on a closed store.
    pub fn clear(&self) -> Result<()> {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            let state = &mut *state;

            let Some(files) = state.files.as_mut() else {
                return Ok(());
            };

            let entries = state.index.len();
            let result = files.reset(&self.config.version).and_then(|()| {
                if self.config.sync_strategy == SyncStrategy::EveryWrite {
                    files.sync()?;
                }
                Ok(())
            });

            if let Err(e) = result {
                // Whatever the index file lost, the map must lose too
                if files.index.has_no_records() {
                    state.index.clear();
                }
                error!(root = %self.root_dir().display(), error = %e, "Error clearing store");
                return Err(e);
            }

            state.index.clear();
            state.unsynced = 0;

            if entries > 0 {
                info!(root = %self.root_dir().display(), entries, "Cleared store");
            }
        }

        self.listeners.notify(&ChangeEvent::cleared(self));
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read the value stored under `key`
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found
    /// - `Ok(None)`: key not present, or store closed
    /// - `Err(Io)`: the data file no longer holds the value
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let state = &mut *state;

        let Some(files) = state.files.as_mut() else {
            return Ok(None);
        };

        let Some(&location) = state.index.get(key) else {
            return Ok(None);
        };

        match files.data.read(location) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                error!(
                    root = %self.root_dir().display(),
                    key,
                    offset = location.offset,
                    size = location.size,
                    error = %e,
                    "Error reading value from store"
                );
                Err(e.into())
            }
        }
    }

    /// Read and deserialize the value stored under `key`
    ///
    /// `Ok(None)` if the key is absent, the store is closed, or the bytes
    /// do not deserialize as `T`. I/O errors are still returned.
    pub fn get_object<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.get(key)? else {
            return Ok(None);
        };

        match object::deserialize(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "Stored value does not deserialize");
                Ok(None)
            }
        }
    }

    /// Whether `key` is present; `None` if the store is closed
    pub fn contains(&self, key: &str) -> Option<bool> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.files.as_ref()?;
        Some(state.index.contains_key(key))
    }

    /// Number of entries; `None` if the store is closed
    pub fn size(&self) -> Option<usize> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.files.as_ref()?;
        Some(state.index.len())
    }

    /// Sorted snapshot of all keys; `None` if the store is closed
    pub fn keys(&self) -> Option<Vec<String>> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.files.as_ref()?;

        let mut keys: Vec<String> = state.index.keys().cloned().collect();
        keys.sort();
        Some(keys)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the store
    ///
    /// Syncs, unlocks and closes both files. Errors are logged and ignored.
    /// Calling it again does nothing.
    pub fn close(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let Some(files) = state.files.take() else {
            return;
        };

        files.release();
        state.index.clear();
        state.unsynced = 0;

        debug!(root = %self.root_dir().display(), "Closed store");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().borrow().files.is_none()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a change listener
    ///
    /// Listeners run on the writing thread while the store lock is held; see
    /// the `listener` module docs for what they may do.
    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.add(listener);
    }

    /// Remove one registration of `listener`; false if it was not registered
    pub fn remove_listener(&self, listener: &Arc<dyn ChangeListener>) -> bool {
        self.listeners.remove(listener)
    }

    /// Number of listener registrations
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the root directory
    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    /// Get the version tag
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.close();
    }
}
