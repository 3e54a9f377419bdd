//! Storage Module
//!
//! On-disk layer of the store: one index file and one data file per root
//! directory, both held under an exclusive advisory lock while open.
//!
//! ## Responsibilities
//! - Encode/decode the index file (version header + key records)
//! - Append values to the data file and read them back by location
//! - Repair a torn index tail left by a crash mid-put
//! - Take and release the per-file locks
//!
//! ## Index File Format
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Header                                      │
//! │ ┌──────────┬──────────────────────────────┐ │
//! │ │ Len (2)  │ Version (modified UTF-8)     │ │
//! │ └──────────┴──────────────────────────────┘ │
//! ├─────────────────────────────────────────────┤
//! │ Record (repeated)                           │
//! │ ┌──────────┬──────┬────────────┬──────────┐ │
//! │ │ Len (2)  │ Key  │ Offset (4) │ Size (4) │ │
//! │ └──────────┴──────┴────────────┴──────────┘ │
//! └─────────────────────────────────────────────┘
//! ```
//! All integers are big-endian. Offset and size are signed 32-bit on disk.
//!
//! ## Data File Format
//! Raw values concatenated in write order. No headers, no padding.

pub mod codec;
mod data_file;
mod index_file;
mod lock;

pub use data_file::DataFile;
pub use index_file::{IndexFile, IndexState, LoadedIndex};
pub use lock::LockedFile;

// =============================================================================
// Shared Constants
// =============================================================================

/// File name of the index file inside the root directory
pub const INDEX_FILE_NAME: &str = "index";

/// File name of the data file inside the root directory
pub const DATA_FILE_NAME: &str = "data";

/// Largest data file length addressable by an index record (`i32::MAX`)
pub const MAX_DATA_LEN: u64 = i32::MAX as u64;

// =============================================================================
// Value Location
// =============================================================================

/// Position and length of one value inside the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueLocation {
    /// Byte offset of the value
    pub offset: u32,
    /// Size of the value in bytes
    pub size: u32,
}

impl ValueLocation {
    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// Offset one past the last byte of the value
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}
