//! Configuration for appendkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Configuration for a single store instance
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory identifying the store
    /// Internal structure:
    ///   {root_dir}/
    ///     ├── index        (version header + key records)
    ///     └── data         (raw concatenated values)
    pub root_dir: PathBuf,

    /// Version tag of the stored content. A store whose index carries a
    /// different tag is cleared on open.
    pub version: String,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync after puts
    pub sync_strategy: SyncStrategy,
}

/// Sync strategy for puts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync data then index after every put and clear (safest, slowest)
    EveryWrite,

    /// fsync after N puts since the last sync
    EveryNEntries { count: usize },

    /// Leave flushing to the OS; sync only on close
    OsManaged,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./appendkv_data"),
            version: String::from("1"),
            sync_strategy: SyncStrategy::OsManaged,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the root directory
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.root_dir = path.into();
        self
    }

    /// Set the version tag
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
