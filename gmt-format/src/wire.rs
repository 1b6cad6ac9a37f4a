//! Low-level wire plumbing shared by every tagged record.
//!
//! This is the same shape as the upstream `PacketIO`/`PacketWriteCommand`
//! machinery: a record produces a short list of write instructions instead
//! of allocating and concatenating buffers, and reads are expressed as
//! "parse a prefix of `&[u8]`, advance the slice".

use alloc::borrow::Cow;
use alloc::vec::Vec;
use tinyvec::TinyVec;

/// A small owned byte buffer, inline up to 16 bytes before spilling to the
/// heap. Used for PIN/TRACK payloads, which are bounded by
/// [`crate::record::MAX_DATA_PAYLOAD`] (256 bytes).
pub type ByteVec = TinyVec<[u8; 16]>;

/// One instruction in a record's serialized form: either a single byte, a
/// borrowed slice, or an owned buffer (used when a value had to be
/// materialized, e.g. a little-endian integer).
#[derive(Debug, Clone)]
pub enum WireWriteCommand<'a> {
    /// A single byte, typically a tag.
    Byte(u8),
    /// A borrowed slice, typically a payload.
    Slice(&'a [u8]),
    /// An owned buffer, typically an encoded fixed-width field.
    Owned(ByteVec),
}

impl<'a> WireWriteCommand<'a> {
    /// The bytes this instruction contributes to the stream.
    pub fn bytes(&self) -> &[u8] {
        match self {
            WireWriteCommand::Byte(b) => core::slice::from_ref(b),
            WireWriteCommand::Slice(s) => s,
            WireWriteCommand::Owned(v) => v,
        }
    }
}

/// A record's write plan: a short, typically stack-allocated, list of
/// instructions to emit in order.
pub type WireInstructions<'a> = TinyVec<[WireWriteCommand<'a>; 6]>;

/// Flattens a [`WireInstructions`] into a single `Vec<u8>`, the form a
/// [`crate::test_file::TestFileSink`] actually writes.
pub fn flatten_instructions(instructions: &WireInstructions<'_>) -> Vec<u8> {
    let total: usize = instructions.iter().map(|i| i.bytes().len()).sum();
    let mut out = Vec::with_capacity(total);
    for instruction in instructions {
        out.extend_from_slice(instruction.bytes());
    }
    out
}

/// A value that can be written to, and parsed back from, the wire format.
pub trait RecordIo<'a>: Sized {
    /// A short name used in error messages.
    fn name() -> &'static str;

    /// Produce this value's write plan.
    fn write_instructions(&'a self) -> WireInstructions<'a>;

    /// Parse a value from the front of `bytes`, advancing it past what was
    /// consumed.
    fn read_all(bytes: &mut &'a [u8]) -> Result<Self, WireReadError>;
}

/// A low-level wire parse failure, below the level of a full test file
/// error (see [`crate::test_file::TestFileReadError`]).
#[derive(Debug, Clone, PartialEq)]
pub enum WireReadError {
    /// The slice ended before a complete value could be parsed.
    NotEnoughData,
    /// The bytes were present but did not form a valid value.
    ParseFail {
        /// A human-readable explanation.
        explanation: Cow<'static, str>,
    },
}

impl core::fmt::Display for WireReadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            WireReadError::NotEnoughData => write!(f, "not enough data"),
            WireReadError::ParseFail { explanation } => write!(f, "parse failure: {explanation}"),
        }
    }
}

pub(crate) fn take<'a>(bytes: &mut &'a [u8], len: usize) -> Result<&'a [u8], WireReadError> {
    if bytes.len() < len {
        return Err(WireReadError::NotEnoughData);
    }
    let (head, tail) = bytes.split_at(len);
    *bytes = tail;
    Ok(head)
}

pub(crate) fn read_u8(bytes: &mut &[u8]) -> Result<u8, WireReadError> {
    Ok(take(bytes, 1)?[0])
}

pub(crate) fn read_u32(bytes: &mut &[u8]) -> Result<u32, WireReadError> {
    let b = take(bytes, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn read_i32(bytes: &mut &[u8]) -> Result<i32, WireReadError> {
    Ok(read_u32(bytes)? as i32)
}

pub(crate) fn read_f64(bytes: &mut &[u8]) -> Result<f64, WireReadError> {
    let b = take(bytes, 8)?;
    Ok(f64::from_le_bytes([
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ]))
}
