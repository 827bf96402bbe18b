//! Runtime contract every generated message type satisfies.
//!
//! A generated type implements the five required methods (tag-dispatch decode,
//! ordered encode, memoized size, field-level merge, required-field check);
//! the framed/byte-array/stream surfaces are provided here once. Framed means
//! the unframed bytes prefixed with their own varint length; framed reads
//! decode inside a bounded sub-view and reject trailing bytes.
//!
//! A message instance is a plain mutable value owned by one thread at a time.
//! The serialized-size cache is not internally synchronized; mutating and
//! serializing the same instance concurrently without external locking is
//! undefined and is the caller's responsibility.

use crate::coded::{CodedReader, CodedWriter};
use crate::wire::{self, WireError};
use std::io::{Read, Write};

pub trait Message: Clone + Default {
    /// Decode fields from `input` until tag 0 or the current limit. Unknown
    /// fields are skipped by wire type; a known field with the wrong wire
    /// type fails the decode.
    fn merge_unframed(&mut self, input: &mut CodedReader<'_>) -> Result<(), WireError>;

    /// Write fields in declaration order, each preceded by its tag, with no
    /// outer length prefix.
    fn write_unframed(&self, output: &mut CodedWriter<'_>) -> Result<(), WireError>;

    /// Byte count `write_unframed` would produce. Memoized; every mutating
    /// accessor invalidates the cache.
    fn serialized_size_unframed(&self) -> usize;

    /// Field-level merge: scalars overwrite, repeated fields append, singular
    /// message fields merge recursively into an existing value.
    fn merge_from(&mut self, other: &Self);

    /// True iff every materialized `required` field has a present value.
    fn is_initialized(&self) -> bool;

    fn clear(&mut self);

    fn serialized_size_framed(&self) -> usize {
        let n = self.serialized_size_unframed();
        wire::varint_size(n as u64) + n
    }

    fn write_framed(&self, output: &mut CodedWriter<'_>) -> Result<(), WireError> {
        output.write_varint64(self.serialized_size_unframed() as u64)?;
        self.write_unframed(output)
    }

    /// Read a varint length, decode exactly that many bytes, and fail with
    /// `TrailingData` if the declared length was not fully consumed.
    fn merge_framed(&mut self, input: &mut CodedReader<'_>) -> Result<(), WireError> {
        let len = input.read_varint64()? as usize;
        let old_limit = input.push_limit(len)?;
        self.merge_unframed(input)?;
        input.check_last_tag_was(0)?;
        let trailing = input.bytes_until_limit();
        if trailing != 0 {
            return Err(WireError::TrailingData(trailing));
        }
        input.pop_limit(old_limit);
        Ok(())
    }

    fn to_unframed_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut result = vec![0u8; self.serialized_size_unframed()];
        let mut output = CodedWriter::to_slice(&mut result);
        self.write_unframed(&mut output)?;
        output.check_no_space_left()?;
        Ok(result)
    }

    fn to_framed_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut result = vec![0u8; self.serialized_size_framed()];
        let mut output = CodedWriter::to_slice(&mut result);
        self.write_framed(&mut output)?;
        output.check_no_space_left()?;
        Ok(result)
    }

    fn parse_unframed(data: &[u8]) -> Result<Self, WireError> {
        let mut message = Self::default();
        let mut input = CodedReader::new(data);
        message.merge_unframed(&mut input)?;
        input.check_last_tag_was(0)?;
        Ok(message)
    }

    fn parse_framed(data: &[u8]) -> Result<Self, WireError> {
        let mut message = Self::default();
        let mut input = CodedReader::new(data);
        message.merge_framed(&mut input)?;
        Ok(message)
    }

    fn write_unframed_to(&self, output: &mut dyn Write) -> Result<(), WireError> {
        output.write_all(&self.to_unframed_bytes()?)?;
        Ok(())
    }

    fn write_framed_to(&self, output: &mut dyn Write) -> Result<(), WireError> {
        output.write_all(&self.to_framed_bytes()?)?;
        Ok(())
    }

    /// Stream form of the framed read: pull the varint length byte-by-byte,
    /// then read exactly that many body bytes.
    fn merge_framed_from(&mut self, input: &mut dyn Read) -> Result<(), WireError> {
        let len = read_varint64_from(input)? as usize;
        let mut data = vec![0u8; len];
        input.read_exact(&mut data).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                WireError::UnexpectedEndOfInput
            } else {
                WireError::Io(e)
            }
        })?;
        let mut reader = CodedReader::new(&data);
        self.merge_unframed(&mut reader)?;
        reader.check_last_tag_was(0)?;
        let trailing = reader.bytes_until_limit();
        if trailing != 0 {
            return Err(WireError::TrailingData(trailing));
        }
        Ok(())
    }
}

/// Groups bracket their body with start/end tags sharing the field number.
pub fn write_group<M: Message>(
    output: &mut CodedWriter<'_>,
    field_number: u32,
    message: &M,
) -> Result<(), WireError> {
    output.write_tag(field_number, wire::WIRETYPE_START_GROUP)?;
    message.write_unframed(output)?;
    output.write_tag(field_number, wire::WIRETYPE_END_GROUP)
}

/// Decode a group body after its start tag; the matching end-group tag must
/// be what terminated it.
pub fn read_group<M: Message>(
    input: &mut CodedReader<'_>,
    field_number: u32,
    group: &mut M,
) -> Result<(), WireError> {
    group.merge_unframed(input)?;
    input.check_last_tag_was(wire::make_tag(field_number, wire::WIRETYPE_END_GROUP))
}

pub fn group_size<M: Message>(field_number: u32, message: &M) -> usize {
    wire::tag_size(field_number) * 2 + message.serialized_size_unframed()
}

/// Embedded messages are length-delimited: tag, varint byte length, body.
pub fn write_message<M: Message>(
    output: &mut CodedWriter<'_>,
    field_number: u32,
    message: &M,
) -> Result<(), WireError> {
    output.write_tag(field_number, wire::WIRETYPE_LENGTH_DELIMITED)?;
    message.write_framed(output)
}

/// Decode an embedded message value (the tag has already been read).
pub fn read_message<M: Message>(
    input: &mut CodedReader<'_>,
    message: &mut M,
) -> Result<(), WireError> {
    message.merge_framed(input)
}

pub fn message_size<M: Message>(field_number: u32, message: &M) -> usize {
    wire::tag_size(field_number) + message.serialized_size_framed()
}

/// Read a varint from a byte stream, one byte at a time, with the same
/// 10-byte malformed rule as the slice decoder.
pub fn read_varint64_from(input: &mut dyn Read) -> Result<u64, WireError> {
    let mut value = 0u64;
    for i in 0..10u32 {
        let mut byte = [0u8; 1];
        input.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                WireError::UnexpectedEndOfInput
            } else {
                WireError::Io(e)
            }
        })?;
        value |= u64::from(byte[0] & 0x7f).wrapping_shl(7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(WireError::MalformedVarint)
}
