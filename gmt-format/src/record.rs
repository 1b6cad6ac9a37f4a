//! The tagged record enum and its wire discriminants.

use crate::input::{InputSnapshot, INPUT_SNAPSHOT_BYTES};
use crate::wire::{read_f64, read_i32, read_u32, read_u8, take, ByteVec, RecordIo, WireInstructions, WireReadError, WireWriteCommand};
use alloc::borrow::Cow;
use alloc::vec::Vec;
use num_enum::TryFromPrimitive;

/// Maximum payload size, in bytes, for a PIN or TRACK record.
pub const MAX_DATA_PAYLOAD: usize = 256;

/// One tagged entry in a test file.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A captured or to-be-injected frame of input.
    Frame {
        /// Seconds since `record_start_time`.
        timestamp_seconds: f64,
        /// The captured input.
        input: InputSnapshot,
    },
    /// A named checkpoint the replay clock realigns against.
    Signal {
        /// Seconds since `record_start_time`, at emission time.
        timestamp_seconds: f64,
        /// The signal's identifier; must match between record and replay.
        signal_id: i32,
    },
    /// A recorded value that overwrites a live variable during replay.
    Pin {
        /// Call-site key (a stable hash of the call site, typically).
        key: u32,
        /// The Nth call with this key, counted since the last frame
        /// boundary and reset at each `Update`/`Reset`.
        sequential_index: u32,
        /// The recorded bytes, host-native layout.
        payload: ByteVec,
    },
    /// A recorded value that is asserted equal to a live variable during
    /// replay.
    Track {
        /// Call-site key.
        key: u32,
        /// The Nth call with this key.
        sequential_index: u32,
        /// The recorded bytes, host-native layout.
        payload: ByteVec,
    },
    /// Terminates the stream. Carries no data.
    End,
}

/// The wire tag byte preceding each record body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RecordTag {
    /// `FRAME`.
    Frame = 0x01,
    /// `SIGNAL`.
    Signal = 0x02,
    /// `PIN`.
    Pin = 0x03,
    /// `TRACK`.
    Track = 0x04,
    /// `END`.
    End = 0xFF,
}

impl Record {
    /// This record's wire tag.
    pub fn tag(&self) -> RecordTag {
        match self {
            Record::Frame { .. } => RecordTag::Frame,
            Record::Signal { .. } => RecordTag::Signal,
            Record::Pin { .. } => RecordTag::Pin,
            Record::Track { .. } => RecordTag::Track,
            Record::End => RecordTag::End,
        }
    }
}

fn write_payload_record<'a>(
    tag: u8,
    key: u32,
    sequential_index: u32,
    payload: &'a ByteVec,
) -> WireInstructions<'a> {
    let mut out = WireInstructions::new();
    out.push(WireWriteCommand::Byte(tag));
    let mut header = ByteVec::new();
    header.extend_from_slice(&key.to_le_bytes());
    header.extend_from_slice(&sequential_index.to_le_bytes());
    header.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.push(WireWriteCommand::Owned(header));
    out.push(WireWriteCommand::Slice(payload));
    out
}

fn read_payload_record(bytes: &mut &[u8]) -> Result<(u32, u32, ByteVec), WireReadError> {
    let key = read_u32(bytes)?;
    let sequential_index = read_u32(bytes)?;
    let payload_len = read_u32(bytes)? as usize;
    if payload_len > MAX_DATA_PAYLOAD {
        return Err(WireReadError::ParseFail {
            explanation: Cow::Borrowed("payload exceeds MAX_DATA_PAYLOAD"),
        });
    }
    let payload_bytes = take(bytes, payload_len)?;
    let mut payload = ByteVec::new();
    payload.extend_from_slice(payload_bytes);
    Ok((key, sequential_index, payload))
}

impl<'a> RecordIo<'a> for Record {
    fn name() -> &'static str {
        "Record"
    }

    fn write_instructions(&'a self) -> WireInstructions<'a> {
        match self {
            Record::Frame {
                timestamp_seconds,
                input,
            } => {
                let mut out = WireInstructions::new();
                out.push(WireWriteCommand::Byte(RecordTag::Frame as u8));
                let mut body = ByteVec::new();
                body.extend_from_slice(&timestamp_seconds.to_le_bytes());
                out.push(WireWriteCommand::Owned(body));
                let mut input_bytes = Vec::with_capacity(INPUT_SNAPSHOT_BYTES);
                input.write_bytes(&mut input_bytes);
                let mut owned = ByteVec::new();
                owned.extend_from_slice(&input_bytes);
                out.push(WireWriteCommand::Owned(owned));
                out
            }
            Record::Signal {
                timestamp_seconds,
                signal_id,
            } => {
                let mut out = WireInstructions::new();
                out.push(WireWriteCommand::Byte(RecordTag::Signal as u8));
                let mut body = ByteVec::new();
                body.extend_from_slice(&timestamp_seconds.to_le_bytes());
                body.extend_from_slice(&signal_id.to_le_bytes());
                out.push(WireWriteCommand::Owned(body));
                out
            }
            Record::Pin {
                key,
                sequential_index,
                payload,
            } => write_payload_record(RecordTag::Pin as u8, *key, *sequential_index, payload),
            Record::Track {
                key,
                sequential_index,
                payload,
            } => write_payload_record(RecordTag::Track as u8, *key, *sequential_index, payload),
            Record::End => {
                let mut out = WireInstructions::new();
                out.push(WireWriteCommand::Byte(RecordTag::End as u8));
                out
            }
        }
    }

    fn read_all(bytes: &mut &'a [u8]) -> Result<Self, WireReadError> {
        let tag_byte = read_u8(bytes)?;
        let tag = RecordTag::try_from_primitive(tag_byte).map_err(|_| WireReadError::ParseFail {
            explanation: Cow::Owned(alloc::format!("unknown record tag 0x{tag_byte:02X}")),
        })?;
        match tag {
            RecordTag::Frame => {
                let timestamp_seconds = read_f64(bytes)?;
                let input = InputSnapshot::read_bytes(bytes).ok_or(WireReadError::NotEnoughData)?;
                Ok(Record::Frame {
                    timestamp_seconds,
                    input,
                })
            }
            RecordTag::Signal => {
                let timestamp_seconds = read_f64(bytes)?;
                let signal_id = read_i32(bytes)?;
                Ok(Record::Signal {
                    timestamp_seconds,
                    signal_id,
                })
            }
            RecordTag::Pin => {
                let (key, sequential_index, payload) = read_payload_record(bytes)?;
                Ok(Record::Pin {
                    key,
                    sequential_index,
                    payload,
                })
            }
            RecordTag::Track => {
                let (key, sequential_index, payload) = read_payload_record(bytes)?;
                Ok(Record::Track {
                    key,
                    sequential_index,
                    payload,
                })
            }
            RecordTag::End => Ok(Record::End),
        }
    }
}
