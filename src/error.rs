//! Error types for appendkv
//!
//! Provides a unified error type for all store operations.
//!
//! Operations on a closed store never produce an error: each one has its own
//! close-tolerant return value (`Ok(())`, `None`) instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for appendkv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Initialization Errors (only returned from `Store::open`)
    // -------------------------------------------------------------------------
    #[error("Failed to initialize store at {}: {source}", path.display())]
    Init {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File is already in use by another store: {}", path.display())]
    Locked { path: PathBuf },

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Data file limit exceeded: {requested} bytes requested, limit is {limit}")]
    CapacityExceeded { requested: u64, limit: u64 },

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Index corruption: {0}")]
    Corruption(String),
}

impl StoreError {
    /// True if the store could not be opened because its files are locked
    pub fn is_locked(&self) -> bool {
        matches!(self, StoreError::Locked { .. })
    }

    /// True for errors caused by the caller's arguments (state untouched)
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StoreError::InvalidArgument(_))
    }

    /// True for errors that can only come out of `Store::open`
    pub fn is_initialization(&self) -> bool {
        matches!(self, StoreError::Init { .. } | StoreError::Locked { .. })
    }
}
