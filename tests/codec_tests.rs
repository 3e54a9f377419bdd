//! Codec Tests
//!
//! Tests for the index file encoding: modified UTF-8 strings and records.
//! Expected bytes match `java.io.DataOutputStream::writeUTF/writeInt`.

use appendkv::storage::codec::{
    check_string, decode_record, encode_header, encode_record, encoded_len, get_string,
    put_string, IndexRecord, MAX_STRING_LEN,
};
use appendkv::storage::ValueLocation;
use appendkv::StoreError;
use bytes::BytesMut;

// =============================================================================
// Helper Functions
// =============================================================================

fn encode(s: &str) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_string(&mut buf, s).unwrap();
    buf.to_vec()
}

fn decode(bytes: &[u8]) -> Option<String> {
    let mut cursor = bytes;
    get_string(&mut cursor).unwrap()
}

// =============================================================================
// String Encoding Tests
// =============================================================================

#[test]
fn test_encode_ascii() {
    assert_eq!(encode("abc"), vec![0, 3, b'a', b'b', b'c']);
}

#[test]
fn test_encode_empty() {
    assert_eq!(encode(""), vec![0, 0]);
}

#[test]
fn test_encode_nul_uses_two_bytes() {
    assert_eq!(encode("\0"), vec![0, 2, 0xC0, 0x80]);
}

#[test]
fn test_encode_two_byte_char() {
    // U+00E9
    assert_eq!(encode("é"), vec![0, 2, 0xC3, 0xA9]);
}

#[test]
fn test_encode_three_byte_char() {
    // U+20AC
    assert_eq!(encode("€"), vec![0, 3, 0xE2, 0x82, 0xAC]);
}

#[test]
fn test_encode_supplementary_char_as_surrogates() {
    // U+1F600 = D83D DE00, each surrogate as 3 bytes
    assert_eq!(
        encode("😀"),
        vec![0, 6, 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
    );
}

#[test]
fn test_encoded_len() {
    assert_eq!(encoded_len("abc"), 3);
    assert_eq!(encoded_len("\0"), 2);
    assert_eq!(encoded_len("é€😀"), 2 + 3 + 6);
}

#[test]
fn test_length_limit() {
    assert!(check_string(&"a".repeat(MAX_STRING_LEN)).is_ok());

    let err = check_string(&"a".repeat(MAX_STRING_LEN + 1)).err().unwrap();
    assert!(err.is_invalid_argument());

    let mut buf = BytesMut::new();
    assert!(put_string(&mut buf, &"é".repeat(40_000)).is_err());
    assert!(buf.is_empty());
}

// =============================================================================
// String Decoding Tests
// =============================================================================

#[test]
fn test_decode_mixed_round_trip() {
    let original = "key \0 é € 😀 日本";
    assert_eq!(decode(&encode(original)), Some(original.to_string()));
}

#[test]
fn test_decode_advances_cursor() {
    let mut bytes = encode("ab");
    bytes.extend_from_slice(&[9, 9]);

    let mut cursor = bytes.as_slice();
    assert_eq!(get_string(&mut cursor).unwrap(), Some("ab".to_string()));
    assert_eq!(cursor, &[9, 9]);
}

#[test]
fn test_decode_raw_nul_byte() {
    // A plain 0x00 is tolerated on read
    assert_eq!(decode(&[0, 1, 0x00]), Some("\0".to_string()));
}

#[test]
fn test_decode_incomplete_prefix() {
    assert_eq!(decode(&[]), None);
    assert_eq!(decode(&[0]), None);
}

#[test]
fn test_decode_incomplete_body() {
    assert_eq!(decode(&[0, 5, b'a', b'b']), None);
}

#[test]
fn test_decode_bad_lead_byte() {
    let mut cursor: &[u8] = &[0, 1, 0x80];
    let err = get_string(&mut cursor).err().unwrap();
    assert!(matches!(err, StoreError::Corruption(_)));
}

#[test]
fn test_decode_bad_continuation_byte() {
    let mut cursor: &[u8] = &[0, 2, 0xC3, 0x41];
    assert!(matches!(
        get_string(&mut cursor),
        Err(StoreError::Corruption(_))
    ));
}

#[test]
fn test_decode_truncated_character() {
    let mut cursor: &[u8] = &[0, 2, 0xE2, 0x82];
    assert!(matches!(
        get_string(&mut cursor),
        Err(StoreError::Corruption(_))
    ));
}

#[test]
fn test_decode_lone_surrogate() {
    // D83D without its low half
    let mut cursor: &[u8] = &[0, 3, 0xED, 0xA0, 0xBD];
    assert!(matches!(
        get_string(&mut cursor),
        Err(StoreError::Corruption(_))
    ));
}

// =============================================================================
// Header/Record Tests
// =============================================================================

#[test]
fn test_encode_header() {
    assert_eq!(encode_header("1").unwrap().to_vec(), vec![0, 1, b'1']);
}

#[test]
fn test_encode_record_layout() {
    let record = encode_record("k", ValueLocation::new(0x0102_0304, 5)).unwrap();
    assert_eq!(
        record.to_vec(),
        vec![0, 1, b'k', 0x01, 0x02, 0x03, 0x04, 0, 0, 0, 5]
    );
}

#[test]
fn test_encode_record_rejects_offset_over_31_bits() {
    let err = encode_record("k", ValueLocation::new(u32::MAX, 0)).err().unwrap();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_decode_record() {
    let bytes = encode_record("one", ValueLocation::new(10, 20)).unwrap();
    let mut cursor = &bytes[..];

    let record = decode_record(&mut cursor).unwrap().unwrap();

    assert_eq!(
        record,
        IndexRecord {
            key: "one".to_string(),
            location: ValueLocation::new(10, 20),
        }
    );
    assert!(cursor.is_empty());
}

#[test]
fn test_decode_consecutive_records() {
    let mut bytes = encode_record("a", ValueLocation::new(0, 1)).unwrap().to_vec();
    bytes.extend_from_slice(&encode_record("b", ValueLocation::new(1, 2)).unwrap());
    let mut cursor = bytes.as_slice();

    let first = decode_record(&mut cursor).unwrap().unwrap();
    let second = decode_record(&mut cursor).unwrap().unwrap();

    assert_eq!(first.key, "a");
    assert_eq!(second.key, "b");
    assert_eq!(second.location, ValueLocation::new(1, 2));
    assert!(cursor.is_empty());
}

#[test]
fn test_decode_record_truncated_location() {
    let bytes = encode_record("one", ValueLocation::new(10, 20)).unwrap();

    for cut in 0..bytes.len() {
        let mut cursor = &bytes[..cut];
        assert_eq!(decode_record(&mut cursor).unwrap(), None, "cut at {}", cut);
    }
}

#[test]
fn test_decode_record_negative_size() {
    let bytes: &[u8] = &[0, 1, b'k', 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF];
    let mut cursor = bytes;

    assert!(matches!(
        decode_record(&mut cursor),
        Err(StoreError::Corruption(_))
    ));
}

#[test]
fn test_value_location_end() {
    let location = ValueLocation::new(i32::MAX as u32, i32::MAX as u32);
    assert_eq!(location.end(), 2 * i32::MAX as u64);
}
