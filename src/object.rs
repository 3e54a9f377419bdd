//! Object values
//!
//! Serialization used by `Store::put_object` / `Store::get_object`.
//! Values are encoded with bincode; failures come back as
//! `StoreError::Serialization`, never as panics.
//!
//! `None` encodes to a single zero byte, so a stored "no value" is distinct
//! from a missing key.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Serialize a value to bytes
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Deserialize a value from bytes
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
