//! Wire-format primitives: varints, zigzag, tag packing, fixed-width sizes.
//!
//! Pure functions with no descriptor knowledge. Everything here mirrors the
//! standard Protocol-Buffers wire format bit-for-bit: base-128 varints with a
//! continuation bit, zigzag mapping for sint32/sint64, `(field << 3) | wire_type`
//! tags, and little-endian fixed-width values. Each encode function has a size
//! twin that returns exactly the byte count the encode would produce.

use byteorder::{ByteOrder, LittleEndian};

/// Wire type 0: base-128 varint.
pub const WIRETYPE_VARINT: u32 = 0;
/// Wire type 1: 8-byte little-endian.
pub const WIRETYPE_FIXED64: u32 = 1;
/// Wire type 2: varint byte length followed by that many bytes.
pub const WIRETYPE_LENGTH_DELIMITED: u32 = 2;
/// Wire type 3: opens a group; closed by the matching end-group tag.
pub const WIRETYPE_START_GROUP: u32 = 3;
/// Wire type 4: closes a group.
pub const WIRETYPE_END_GROUP: u32 = 4;
/// Wire type 5: 4-byte little-endian.
pub const WIRETYPE_FIXED32: u32 = 5;

/// Number of low tag bits holding the wire type.
pub const TAG_TYPE_BITS: u32 = 3;
const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// Highest valid field number (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers 19000-19999 are reserved by the wire format.
pub const RESERVED_FIELD_NUMBER_MIN: u32 = 19000;
pub const RESERVED_FIELD_NUMBER_MAX: u32 = 19999;

/// Errors raised while reading or writing wire-format bytes. Decode errors
/// abort the current operation on first occurrence; a corrupted stream cannot
/// be trusted to resynchronize.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed varint: no terminating byte within 10 bytes")]
    MalformedVarint,
    #[error("field {field}: expected wire type {expected}, found {actual}")]
    WireTypeMismatch { field: u32, expected: u32, actual: u32 },
    #[error("{0} trailing byte(s) inside a framed message after its end")]
    TrailingData(usize),
    #[error("input ended unexpectedly in the middle of a field")]
    UnexpectedEndOfInput,
    #[error("invalid wire type {0}")]
    InvalidWireType(u32),
    #[error("end-group tag {actual:#x} did not match expected tag {expected:#x}")]
    InvalidEndTag { expected: u32, actual: u32 },
    #[error("output buffer too small for the computed message size")]
    OutOfSpace,
}

/// Pack a field number and wire type into a tag.
pub fn make_tag(field_number: u32, wire_type: u32) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type
}

/// Split a tag into (field number, wire type).
pub fn split_tag(tag: u32) -> (u32, u32) {
    (tag >> TAG_TYPE_BITS, tag & TAG_TYPE_MASK)
}

/// Encode an unsigned value as a base-128 varint, low groups first,
/// continuation bit set on every byte but the last.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_size(value));
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Decode a varint from the front of `bytes`, returning (value, bytes consumed).
///
/// A varint longer than 10 bytes is malformed; a slice ending with the
/// continuation bit still set is truncated input.
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize), WireError> {
    let mut value = 0u64;
    for (i, &byte) in bytes.iter().enumerate().take(10) {
        // Bits past the 64th are discarded, but the byte still counts.
        value |= u64::from(byte & 0x7f).wrapping_shl(7 * i as u32);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if bytes.len() < 10 {
        Err(WireError::UnexpectedEndOfInput)
    } else {
        Err(WireError::MalformedVarint)
    }
}

/// Decode a 32-bit varint: bits beyond the 32nd are discarded (two's-complement
/// truncation), but up to 10 bytes are still consumed.
pub fn decode_varint32(bytes: &[u8]) -> Result<(u32, usize), WireError> {
    let (value, consumed) = decode_varint(bytes)?;
    Ok((value as u32, consumed))
}

/// Byte count `encode_varint` would produce.
pub fn varint_size(value: u64) -> usize {
    if value < 1 << 7 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    (bits + 6) / 7
}

/// Byte count for a 32-bit unsigned varint.
pub fn varint32_size(value: u32) -> usize {
    varint_size(u64::from(value))
}

/// `n << 1 XOR n >> 31` with arithmetic shift: maps small-magnitude negatives
/// to small unsigned values so they stay cheap to varint-encode.
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Little-endian fixed32 encode.
pub fn encode_fixed32(value: u32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, value);
    buf
}

pub fn decode_fixed32(bytes: &[u8]) -> Result<u32, WireError> {
    if bytes.len() < 4 {
        return Err(WireError::UnexpectedEndOfInput);
    }
    Ok(LittleEndian::read_u32(&bytes[..4]))
}

/// Little-endian fixed64 encode.
pub fn encode_fixed64(value: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, value);
    buf
}

pub fn decode_fixed64(bytes: &[u8]) -> Result<u64, WireError> {
    if bytes.len() < 8 {
        return Err(WireError::UnexpectedEndOfInput);
    }
    Ok(LittleEndian::read_u64(&bytes[..8]))
}

/// Generated decoders call this on every known field: a known field number
/// carrying the wrong wire type fails the decode instead of being skipped.
pub fn expect_wire_type(field: u32, expected: u32, actual: u32) -> Result<(), WireError> {
    if expected == actual {
        Ok(())
    } else {
        Err(WireError::WireTypeMismatch {
            field,
            expected,
            actual,
        })
    }
}

/// Size of the tag preceding a field value.
pub fn tag_size(field_number: u32) -> usize {
    varint32_size(make_tag(field_number, 0))
}

// Per-field size functions: tag plus value, matching the writer methods in
// `coded` byte-for-byte. Negative int32/int64/enum values are sign-extended to
// 64 bits on the wire and always take 10 bytes.

pub fn int32_size(field_number: u32, value: i32) -> usize {
    if value >= 0 {
        tag_size(field_number) + varint32_size(value as u32)
    } else {
        tag_size(field_number) + 10
    }
}

pub fn int64_size(field_number: u32, value: i64) -> usize {
    tag_size(field_number) + varint_size(value as u64)
}

pub fn uint32_size(field_number: u32, value: u32) -> usize {
    tag_size(field_number) + varint32_size(value)
}

pub fn uint64_size(field_number: u32, value: u64) -> usize {
    tag_size(field_number) + varint_size(value)
}

pub fn sint32_size(field_number: u32, value: i32) -> usize {
    tag_size(field_number) + varint32_size(zigzag_encode32(value))
}

pub fn sint64_size(field_number: u32, value: i64) -> usize {
    tag_size(field_number) + varint_size(zigzag_encode64(value))
}

pub fn bool_size(field_number: u32, _value: bool) -> usize {
    tag_size(field_number) + 1
}

pub fn enum_size(field_number: u32, number: i32) -> usize {
    int32_size(field_number, number)
}

pub fn fixed32_size(field_number: u32) -> usize {
    tag_size(field_number) + 4
}

pub fn fixed64_size(field_number: u32) -> usize {
    tag_size(field_number) + 8
}

pub fn float_size(field_number: u32) -> usize {
    fixed32_size(field_number)
}

pub fn double_size(field_number: u32) -> usize {
    fixed64_size(field_number)
}

pub fn string_size(field_number: u32, value: &str) -> usize {
    bytes_size(field_number, value.as_bytes())
}

pub fn bytes_size(field_number: u32, value: &[u8]) -> usize {
    tag_size(field_number) + varint_size(value.len() as u64) + value.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trip() {
        for n in [
            0u64,
            1,
            127,
            128,
            300,
            16383,
            16384,
            u32::MAX as u64,
            u64::MAX / 2,
            u64::MAX,
        ] {
            let encoded = encode_varint(n);
            assert_eq!(encoded.len(), varint_size(n), "size mismatch for {}", n);
            let (decoded, consumed) = decode_varint(&encoded).expect("decode");
            assert_eq!(decoded, n);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn varint_size_boundaries() {
        assert_eq!(varint_size(0), 1);
        assert_eq!(varint_size(0x7f), 1);
        assert_eq!(varint_size(0x80), 2);
        assert_eq!(varint_size(0x3fff), 2);
        assert_eq!(varint_size(0x4000), 3);
        assert_eq!(varint_size(u64::MAX), 10);
    }

    #[test]
    fn varint_malformed_after_ten_bytes() {
        let bytes = [0x80u8; 11];
        assert!(matches!(
            decode_varint(&bytes),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn varint_truncated_input() {
        let bytes = [0x80u8, 0x80];
        assert!(matches!(
            decode_varint(&bytes),
            Err(WireError::UnexpectedEndOfInput)
        ));
    }

    #[test]
    fn varint32_truncates_but_consumes_all_bytes() {
        // int32 -4 on the wire: ten bytes, sign-extended to 64 bits.
        let encoded = encode_varint(-4i64 as u64);
        assert_eq!(encoded.len(), 10);
        let (value, consumed) = decode_varint32(&encoded).expect("decode");
        assert_eq!(consumed, 10);
        assert_eq!(value as i32, -4);
    }

    #[test]
    fn zigzag_round_trip() {
        for n in [0i32, -1, 1, -2, 2, i32::MIN, i32::MAX] {
            assert_eq!(zigzag_decode32(zigzag_encode32(n)), n);
        }
        for n in [0i64, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(zigzag_decode64(zigzag_encode64(n)), n);
        }
        assert_eq!(zigzag_encode32(0), 0);
        assert_eq!(zigzag_encode32(-1), 1);
        assert_eq!(zigzag_encode32(1), 2);
        assert_eq!(zigzag_encode64(-1), 1);
    }

    #[test]
    fn tag_pack_unpack() {
        for field in [1u32, 2, 15, 16, 2047, 2048, MAX_FIELD_NUMBER] {
            for wt in 0..=5 {
                assert_eq!(split_tag(make_tag(field, wt)), (field, wt));
            }
        }
        assert_eq!(make_tag(1, WIRETYPE_VARINT), 0x08);
        assert_eq!(make_tag(2, WIRETYPE_VARINT), 0x10);
    }

    #[test]
    fn fixed_round_trip() {
        assert_eq!(decode_fixed32(&encode_fixed32(0xdeadbeef)).unwrap(), 0xdeadbeef);
        assert_eq!(
            decode_fixed64(&encode_fixed64(0x0123456789abcdef)).unwrap(),
            0x0123456789abcdef
        );
        assert_eq!(encode_fixed32(1), [1, 0, 0, 0]);
    }

    #[test]
    fn int32_negative_is_ten_bytes() {
        assert_eq!(int32_size(1, -4), tag_size(1) + 10);
        assert_eq!(int32_size(1, 3), tag_size(1) + 1);
    }

    #[test]
    fn float_bits_are_preserved() {
        // A non-canonical NaN must survive the fixed32 path untouched.
        let nan_bits = 0x7fc0_0001u32;
        let f = f32::from_bits(nan_bits);
        assert_eq!(decode_fixed32(&encode_fixed32(f.to_bits())).unwrap(), nan_bits);
    }
}
