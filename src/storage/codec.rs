//! Index codec
//!
//! Encoding and decoding of the index file contents.
//!
//! ## String Format (modified UTF-8)
//! ```text
//! ┌──────────┬──────────────────────────────────┐
//! │ Len (2)  │ Encoded UTF-16 code units        │
//! └──────────┴──────────────────────────────────┘
//! ```
//! - U+0001..U+007F: 1 byte
//! - U+0000, U+0080..U+07FF: 2 bytes
//! - U+0800..U+FFFF: 3 bytes (surrogate halves are encoded one by one)
//!
//! This is byte-compatible with `java.io.DataOutput::writeUTF`, so existing
//! index files stay readable.
//!
//! ## Record Format
//! ```text
//! ┌──────────────┬────────────┬──────────┐
//! │ Key (string) │ Offset (4) │ Size (4) │
//! └──────────────┴────────────┴──────────┘
//! ```

use bytes::{Buf, BufMut, BytesMut};

use super::ValueLocation;
use crate::error::{Result, StoreError};

/// Maximum encoded length of a string (excluding the 2-byte prefix)
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Size of the offset + size fields that follow a record key
pub const LOCATION_SIZE: usize = 8;

/// A decoded index record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub key: String,
    pub location: ValueLocation,
}

// =============================================================================
// String Encoding/Decoding
// =============================================================================

/// Number of bytes `s` occupies in modified UTF-8, without the length prefix
pub fn encoded_len(s: &str) -> usize {
    s.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Check that `s` fits in a length-prefixed string
pub fn check_string(s: &str) -> Result<()> {
    let len = encoded_len(s);
    if len > MAX_STRING_LEN {
        return Err(StoreError::InvalidArgument(format!(
            "string too long: {} encoded bytes (max {})",
            len, MAX_STRING_LEN
        )));
    }
    Ok(())
}

/// Append a length-prefixed modified UTF-8 string
pub fn put_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    check_string(s)?;
    let len = encoded_len(s);

    buf.reserve(2 + len);
    buf.put_u16(len as u16);

    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => buf.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buf.put_u8(0xC0 | ((unit >> 6) & 0x1F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                buf.put_u8(0xE0 | ((unit >> 12) & 0x0F) as u8);
                buf.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                buf.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }

    Ok(())
}

/// Read a length-prefixed modified UTF-8 string
///
/// Returns:
/// - `Ok(Some(s))`: complete string, `buf` advanced past it
/// - `Ok(None)`: not enough bytes left (torn write)
/// - `Err(Corruption)`: malformed encoding
pub fn get_string(buf: &mut &[u8]) -> Result<Option<String>> {
    if buf.remaining() < 2 {
        return Ok(None);
    }

    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if buf.remaining() < 2 + len {
        return Ok(None);
    }

    buf.advance(2);
    let units = decode_units(&buf[..len])?;
    buf.advance(len);

    String::from_utf16(&units)
        .map(Some)
        .map_err(|e| StoreError::Corruption(format!("invalid UTF-16 in string: {}", e)))
}

/// Decode modified UTF-8 bytes into UTF-16 code units
fn decode_units(bytes: &[u8]) -> Result<Vec<u16>> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let first = u16::from(bytes[pos]);
        match first >> 4 {
            0..=7 => {
                units.push(first);
                pos += 1;
            }
            12 | 13 => {
                let second = continuation(bytes, pos + 1)?;
                units.push(((first & 0x1F) << 6) | second);
                pos += 2;
            }
            14 => {
                let second = continuation(bytes, pos + 1)?;
                let third = continuation(bytes, pos + 2)?;
                units.push(((first & 0x0F) << 12) | (second << 6) | third);
                pos += 3;
            }
            _ => {
                return Err(StoreError::Corruption(format!(
                    "malformed string: unexpected byte 0x{:02x} at {}",
                    first, pos
                )));
            }
        }
    }

    Ok(units)
}

/// Payload bits of a continuation byte (10xxxxxx)
fn continuation(bytes: &[u8], pos: usize) -> Result<u16> {
    match bytes.get(pos) {
        Some(&b) if b & 0xC0 == 0x80 => Ok(u16::from(b & 0x3F)),
        Some(&b) => Err(StoreError::Corruption(format!(
            "malformed string: bad continuation byte 0x{:02x} at {}",
            b, pos
        ))),
        None => Err(StoreError::Corruption(
            "malformed string: partial character at end".to_string(),
        )),
    }
}

// =============================================================================
// Header/Record Encoding/Decoding
// =============================================================================

/// Encode the index header (the version tag)
pub fn encode_header(version: &str) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(2 + version.len());
    put_string(&mut buf, version)?;
    Ok(buf)
}

/// Encode one index record
///
/// Format: key (string) + offset (i32 BE) + size (i32 BE)
pub fn encode_record(key: &str, location: ValueLocation) -> Result<BytesMut> {
    let offset = i32::try_from(location.offset).map_err(|_| {
        StoreError::InvalidArgument(format!("offset {} does not fit in 31 bits", location.offset))
    })?;
    let size = i32::try_from(location.size).map_err(|_| {
        StoreError::InvalidArgument(format!("size {} does not fit in 31 bits", location.size))
    })?;

    let mut buf = BytesMut::with_capacity(2 + key.len() + LOCATION_SIZE);
    put_string(&mut buf, key)?;
    buf.put_i32(offset);
    buf.put_i32(size);
    Ok(buf)
}

/// Decode one index record
///
/// Same return convention as [`get_string`]: `Ok(None)` means the record is
/// incomplete. On `Ok(None)` and `Err`, how far `buf` moved is unspecified.
pub fn decode_record(buf: &mut &[u8]) -> Result<Option<IndexRecord>> {
    let key = match get_string(buf)? {
        Some(key) => key,
        None => return Ok(None),
    };

    if buf.remaining() < LOCATION_SIZE {
        return Ok(None);
    }

    let offset = buf.get_i32();
    let size = buf.get_i32();

    if offset < 0 || size < 0 {
        return Err(StoreError::Corruption(format!(
            "negative location for key {:?}: offset={}, size={}",
            key, offset, size
        )));
    }

    Ok(Some(IndexRecord {
        key,
        location: ValueLocation::new(offset as u32, size as u32),
    }))
}
