//! Bounds-checked reader/writer over wire-format bytes.
//!
//! `CodedReader` walks a byte slice one field at a time, with a limit stack so
//! an embedded length-delimited message decodes inside a bounded sub-view.
//! `CodedWriter` appends to a growable `Vec<u8>` or fills a caller-supplied
//! fixed slice; the fixed form can assert the computed size was exact.

use crate::wire::{self, WireError};
use byteorder::{ByteOrder, LittleEndian};

/// Reads wire-format values from a byte slice.
///
/// Tracks the last tag read (group framing checks) and counts enum values
/// that decoded to no known symbol, so strict callers can observe soft drops.
pub struct CodedReader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
    last_tag: u32,
    unrecognized_enums: u64,
}

impl<'a> CodedReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        CodedReader {
            buf,
            pos: 0,
            limit: buf.len(),
            last_tag: 0,
            unrecognized_enums: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read the next field tag. Returns 0 at the current limit or at a
    /// zero tag in the stream; both signal end of message.
    pub fn read_tag(&mut self) -> Result<u32, WireError> {
        if self.pos >= self.limit {
            self.last_tag = 0;
            return Ok(0);
        }
        let tag = self.read_varint32()?;
        self.last_tag = tag;
        Ok(tag)
    }

    /// Group and framed decoders assert the tag that ended the last message.
    pub fn check_last_tag_was(&self, expected: u32) -> Result<(), WireError> {
        if self.last_tag == expected {
            Ok(())
        } else {
            Err(WireError::InvalidEndTag {
                expected,
                actual: self.last_tag,
            })
        }
    }

    /// Narrow the readable window to the next `len` bytes, returning the old
    /// limit for `pop_limit`. An embedded message that claims more bytes than
    /// remain is truncated input.
    pub fn push_limit(&mut self, len: usize) -> Result<usize, WireError> {
        let new_limit = self
            .pos
            .checked_add(len)
            .ok_or(WireError::UnexpectedEndOfInput)?;
        if new_limit > self.limit {
            return Err(WireError::UnexpectedEndOfInput);
        }
        let old = self.limit;
        self.limit = new_limit;
        Ok(old)
    }

    pub fn pop_limit(&mut self, old_limit: usize) {
        self.limit = old_limit;
    }

    pub fn bytes_until_limit(&self) -> usize {
        self.limit - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.bytes_until_limit() < n {
            return Err(WireError::UnexpectedEndOfInput);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_varint64(&mut self) -> Result<u64, WireError> {
        let (value, consumed) = wire::decode_varint(&self.buf[self.pos..self.limit])?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn read_varint32(&mut self) -> Result<u32, WireError> {
        Ok(self.read_varint64()? as u32)
    }

    pub fn read_int32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_varint32()? as i32)
    }

    pub fn read_int64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_varint64()? as i64)
    }

    pub fn read_uint32(&mut self) -> Result<u32, WireError> {
        self.read_varint32()
    }

    pub fn read_uint64(&mut self) -> Result<u64, WireError> {
        self.read_varint64()
    }

    pub fn read_sint32(&mut self) -> Result<i32, WireError> {
        Ok(wire::zigzag_decode32(self.read_varint32()?))
    }

    pub fn read_sint64(&mut self) -> Result<i64, WireError> {
        Ok(wire::zigzag_decode64(self.read_varint64()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_varint64()? != 0)
    }

    pub fn read_fixed32(&mut self) -> Result<u32, WireError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, WireError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_sfixed32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_fixed32()? as i32)
    }

    pub fn read_sfixed64(&mut self) -> Result<i64, WireError> {
        Ok(self.read_fixed64()? as i64)
    }

    /// Raw bit pattern, no NaN canonicalization.
    pub fn read_float(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    pub fn read_double(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_varint64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Invalid UTF-8 decodes with replacement characters rather than failing
    /// the message.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let len = self.read_varint64()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    pub fn read_enum(&mut self) -> Result<i32, WireError> {
        self.read_int32()
    }

    /// Called by generated decoders when an enum value has no known symbol:
    /// the value is dropped, decode continues, and the drop stays observable.
    pub fn note_unrecognized_enum(&mut self) {
        self.unrecognized_enums += 1;
    }

    pub fn unrecognized_enum_count(&self) -> u64 {
        self.unrecognized_enums
    }

    /// Skip one field of the given wire type. Returns `false` on an end-group
    /// tag, which terminates the enclosing message rather than being skipped.
    pub fn skip_field(&mut self, wire_type: u32) -> Result<bool, WireError> {
        match wire_type {
            wire::WIRETYPE_VARINT => {
                self.read_varint64()?;
            }
            wire::WIRETYPE_FIXED64 => {
                self.take(8)?;
            }
            wire::WIRETYPE_LENGTH_DELIMITED => {
                let len = self.read_varint64()? as usize;
                self.take(len)?;
            }
            wire::WIRETYPE_START_GROUP => {
                // Nested unknown group: skip until its end-group tag.
                loop {
                    let tag = self.read_tag()?;
                    if tag == 0 {
                        return Err(WireError::UnexpectedEndOfInput);
                    }
                    let (_, wt) = wire::split_tag(tag);
                    if !self.skip_field(wt)? {
                        break;
                    }
                }
            }
            wire::WIRETYPE_END_GROUP => return Ok(false),
            wire::WIRETYPE_FIXED32 => {
                self.take(4)?;
            }
            other => return Err(WireError::InvalidWireType(other)),
        }
        Ok(true)
    }
}

enum Sink<'a> {
    Growable(&'a mut Vec<u8>),
    Fixed { buf: &'a mut [u8], pos: usize },
}

/// Writes wire-format values, either appending to a `Vec<u8>` or filling a
/// pre-sized slice (the exact-size path used by `to_unframed_bytes`).
pub struct CodedWriter<'a> {
    sink: Sink<'a>,
}

impl<'a> CodedWriter<'a> {
    pub fn to_vec(out: &'a mut Vec<u8>) -> Self {
        CodedWriter {
            sink: Sink::Growable(out),
        }
    }

    pub fn to_slice(buf: &'a mut [u8]) -> Self {
        CodedWriter {
            sink: Sink::Fixed { buf, pos: 0 },
        }
    }

    /// For the fixed form: the computed serialized size must have filled the
    /// buffer exactly. Size memoization bugs surface here.
    pub fn check_no_space_left(&self) -> Result<(), WireError> {
        match &self.sink {
            Sink::Growable(_) => Ok(()),
            Sink::Fixed { buf, pos } => {
                if *pos == buf.len() {
                    Ok(())
                } else {
                    Err(WireError::OutOfSpace)
                }
            }
        }
    }

    pub fn write_raw_byte(&mut self, byte: u8) -> Result<(), WireError> {
        self.write_raw_bytes(&[byte])
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        match &mut self.sink {
            Sink::Growable(out) => {
                out.extend_from_slice(bytes);
                Ok(())
            }
            Sink::Fixed { buf, pos } => {
                if buf.len() - *pos < bytes.len() {
                    return Err(WireError::OutOfSpace);
                }
                buf[*pos..*pos + bytes.len()].copy_from_slice(bytes);
                *pos += bytes.len();
                Ok(())
            }
        }
    }

    pub fn write_varint64(&mut self, mut value: u64) -> Result<(), WireError> {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                return self.write_raw_byte(byte);
            }
            self.write_raw_byte(byte | 0x80)?;
        }
    }

    pub fn write_varint32(&mut self, value: u32) -> Result<(), WireError> {
        self.write_varint64(u64::from(value))
    }

    pub fn write_tag(&mut self, field_number: u32, wire_type: u32) -> Result<(), WireError> {
        self.write_varint32(wire::make_tag(field_number, wire_type))
    }

    /// Negative int32 values are sign-extended to 64 bits, always 10 bytes.
    pub fn write_int32(&mut self, field_number: u32, value: i32) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint64(i64::from(value) as u64)
    }

    pub fn write_int64(&mut self, field_number: u32, value: i64) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint64(value as u64)
    }

    pub fn write_uint32(&mut self, field_number: u32, value: u32) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint32(value)
    }

    pub fn write_uint64(&mut self, field_number: u32, value: u64) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint64(value)
    }

    pub fn write_sint32(&mut self, field_number: u32, value: i32) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint32(wire::zigzag_encode32(value))
    }

    pub fn write_sint64(&mut self, field_number: u32, value: i64) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_varint64(wire::zigzag_encode64(value))
    }

    pub fn write_bool(&mut self, field_number: u32, value: bool) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_VARINT)?;
        self.write_raw_byte(u8::from(value))
    }

    pub fn write_fixed32(&mut self, field_number: u32, value: u32) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_FIXED32)?;
        self.write_raw_bytes(&wire::encode_fixed32(value))
    }

    pub fn write_fixed64(&mut self, field_number: u32, value: u64) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_FIXED64)?;
        self.write_raw_bytes(&wire::encode_fixed64(value))
    }

    pub fn write_sfixed32(&mut self, field_number: u32, value: i32) -> Result<(), WireError> {
        self.write_fixed32(field_number, value as u32)
    }

    pub fn write_sfixed64(&mut self, field_number: u32, value: i64) -> Result<(), WireError> {
        self.write_fixed64(field_number, value as u64)
    }

    /// Raw bit pattern, no NaN canonicalization.
    pub fn write_float(&mut self, field_number: u32, value: f32) -> Result<(), WireError> {
        self.write_fixed32(field_number, value.to_bits())
    }

    pub fn write_double(&mut self, field_number: u32, value: f64) -> Result<(), WireError> {
        self.write_fixed64(field_number, value.to_bits())
    }

    pub fn write_string(&mut self, field_number: u32, value: &str) -> Result<(), WireError> {
        self.write_bytes(field_number, value.as_bytes())
    }

    pub fn write_bytes(&mut self, field_number: u32, value: &[u8]) -> Result<(), WireError> {
        self.write_tag(field_number, wire::WIRETYPE_LENGTH_DELIMITED)?;
        self.write_varint64(value.len() as u64)?;
        self.write_raw_bytes(value)
    }

    pub fn write_enum(&mut self, field_number: u32, number: i32) -> Result<(), WireError> {
        self.write_int32(field_number, number)
    }
}
