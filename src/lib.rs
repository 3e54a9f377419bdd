//! # appendkv
//!
//! A file-backed, append-only key-value store with:
//! - Byte values under string keys, immutable once written (first write wins)
//! - An in-memory index rebuilt from the index file on open
//! - Exclusive advisory locks: one live store per root directory
//! - A version tag that clears stale content on open
//! - Change listeners for puts and clears
//! - Close tolerance: every call after `close` is a harmless no-op
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │            (ReentrantMutex, one lock per store)              │
//! └──────┬─────────────────────┬───────────────────────┬────────┘
//!        │                     │                       │
//!        ▼                     ▼                       ▼
//!  ┌────────────┐      ┌──────────────┐        ┌──────────────┐
//!  │  HashMap   │      │  Index File  │        │  Data File   │
//!  │ key → loc  │      │ header+recs  │        │  raw values  │
//!  └────────────┘      └──────────────┘        └──────────────┘
//!                              │                       │
//!                              └──────── fs2 locks ────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use appendkv::Store;
//!
//! # fn main() -> appendkv::Result<()> {
//! let store = Store::open_path(Path::new("cache"), "1")?;
//! store.put("one", &[0, 1, 2, 3, 4])?;
//! assert_eq!(store.get("one")?, Some(vec![0, 1, 2, 3, 4]));
//! store.close();
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod listener;
pub mod object;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{StoreConfig, SyncStrategy};
pub use listener::{ChangeEvent, ChangeListener};
pub use storage::ValueLocation;
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of appendkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
