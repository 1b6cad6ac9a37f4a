//! The full-load decoder: validates the header, then scans the record
//! stream twice (count, then copy) into typed arrays.

use crate::input::InputSnapshot;
use crate::record::{Record, RecordTag};
use crate::test_file::header::FileHeader;
use crate::wire::{ByteVec, RecordIo, WireReadError};
use alloc::vec::Vec;
use num_enum::TryFromPrimitive;

/// Errors the decoder can report. See SPEC_FULL.md §4.2 and §7.
#[derive(Debug, Clone, PartialEq)]
pub enum TestFileReadError {
    /// The header's magic bytes didn't match.
    BadMagic,
    /// The header's version isn't one this crate's decoder supports.
    BadVersion,
    /// A record body extended past the end of the file.
    FileTruncated,
    /// An unrecognized tag byte appeared in the stream.
    UnknownTag(u8),
}

impl core::fmt::Display for TestFileReadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TestFileReadError::BadMagic => write!(f, "bad magic"),
            TestFileReadError::BadVersion => write!(f, "unsupported version"),
            TestFileReadError::FileTruncated => write!(f, "file truncated"),
            TestFileReadError::UnknownTag(tag) => write!(f, "unknown record tag 0x{tag:02X}"),
        }
    }
}

/// The fully decoded contents of a test file, ready to drive REPLAY mode.
///
/// Grounded in `ReplayFilePlayer`: this is the in-memory form the Clock &
/// Signal Engine, Inject Engine, Pin Store and Track Store all read from.
#[derive(Debug, Clone, Default)]
pub struct DecodedTestFile {
    /// The parsed header.
    pub header: Option<FileHeader>,
    /// Decoded FRAME records, in file order.
    pub frames: Vec<(f64, InputSnapshot)>,
    /// Decoded SIGNAL records, in file order.
    pub signals: Vec<(f64, i32)>,
    /// Decoded PIN records, in file order.
    pub pins: Vec<(u32, u32, ByteVec)>,
    /// Decoded TRACK records, in file order.
    pub tracks: Vec<(u32, u32, ByteVec)>,
}

impl DecodedTestFile {
    /// Parse and fully decode a test file's bytes.
    pub fn decode(bytes: &[u8]) -> Result<DecodedTestFile, TestFileReadError> {
        let header = FileHeader::parse(bytes).map_err(|e| {
            if e.contains("magic") {
                TestFileReadError::BadMagic
            } else if e.contains("version") {
                TestFileReadError::BadVersion
            } else {
                TestFileReadError::FileTruncated
            }
        })?;
        let body = &bytes[4..];

        let (frame_count, signal_count, pin_count, track_count) = Self::count_records(body)?;

        let mut decoded = DecodedTestFile {
            header: Some(header),
            frames: Vec::with_capacity(frame_count),
            signals: Vec::with_capacity(signal_count),
            pins: Vec::with_capacity(pin_count),
            tracks: Vec::with_capacity(track_count),
        };

        let mut cursor = body;
        loop {
            let record = Self::read_one(&mut cursor)?;
            match record {
                Record::Frame {
                    timestamp_seconds,
                    input,
                } => decoded.frames.push((timestamp_seconds, input)),
                Record::Signal {
                    timestamp_seconds,
                    signal_id,
                } => decoded.signals.push((timestamp_seconds, signal_id)),
                Record::Pin {
                    key,
                    sequential_index,
                    payload,
                } => decoded.pins.push((key, sequential_index, payload)),
                Record::Track {
                    key,
                    sequential_index,
                    payload,
                } => decoded.tracks.push((key, sequential_index, payload)),
                Record::End => break,
            }
        }

        Self::warn_if_out_of_order(&decoded.frames);

        Ok(decoded)
    }

    fn count_records(body: &[u8]) -> Result<(usize, usize, usize, usize), TestFileReadError> {
        let mut cursor = body;
        let (mut frames, mut signals, mut pins, mut tracks) = (0, 0, 0, 0);
        loop {
            let record = Self::read_one(&mut cursor)?;
            match record {
                Record::Frame { .. } => frames += 1,
                Record::Signal { .. } => signals += 1,
                Record::Pin { .. } => pins += 1,
                Record::Track { .. } => tracks += 1,
                Record::End => break,
            }
        }
        Ok((frames, signals, pins, tracks))
    }

    fn read_one<'a>(cursor: &mut &'a [u8]) -> Result<Record, TestFileReadError> {
        let Some(&tag_byte) = cursor.first() else {
            return Err(TestFileReadError::FileTruncated);
        };
        if RecordTag::try_from_primitive(tag_byte).is_err() {
            return Err(TestFileReadError::UnknownTag(tag_byte));
        }
        Record::read_all(cursor).map_err(|e| match e {
            WireReadError::NotEnoughData => TestFileReadError::FileTruncated,
            WireReadError::ParseFail { .. } => TestFileReadError::UnknownTag(tag_byte),
        })
    }

    /// Out-of-order timestamps are a producer bug, not a decode failure
    /// (SPEC_FULL.md §4.2): warn, don't fail.
    fn warn_if_out_of_order(frames: &[(f64, InputSnapshot)]) {
        let mut last = f64::NEG_INFINITY;
        for (timestamp, _) in frames {
            if *timestamp < last {
                log::warn!("test file contains out-of-order FRAME timestamps");
                return;
            }
            last = *timestamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_file::writer::{StreamWriter, TestFileSink};

    fn build_file(records: &[Record]) -> Vec<u8> {
        let mut writer = StreamWriter::new(Vec::new()).unwrap();
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.close().unwrap()
    }

    #[test]
    fn decodes_frames_signals_pins_tracks() {
        let mut payload = ByteVec::new();
        payload.extend_from_slice(&7u32.to_le_bytes());
        let bytes = build_file(&[
            Record::Frame {
                timestamp_seconds: 0.0,
                input: InputSnapshot::default(),
            },
            Record::Signal {
                timestamp_seconds: 0.1,
                signal_id: 7,
            },
            Record::Pin {
                key: 1,
                sequential_index: 0,
                payload: payload.clone(),
            },
            Record::Track {
                key: 1,
                sequential_index: 0,
                payload,
            },
        ]);

        let decoded = DecodedTestFile::decode(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.signals, alloc::vec![(0.1, 7)]);
        assert_eq!(decoded.pins.len(), 1);
        assert_eq!(decoded.tracks.len(), 1);
    }

    #[test]
    fn rejects_truncated_file() {
        let mut bytes = build_file(&[Record::Frame {
            timestamp_seconds: 0.0,
            input: InputSnapshot::default(),
        }]);
        bytes.truncate(bytes.len() - 1);
        assert_eq!(
            DecodedTestFile::decode(&bytes),
            Err(TestFileReadError::FileTruncated)
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut bytes = build_file(&[]);
        // Splice an unknown tag in before the END tag.
        let end_pos = bytes.len() - 1;
        bytes.insert(end_pos, 0x05);
        assert_eq!(
            DecodedTestFile::decode(&bytes),
            Err(TestFileReadError::UnknownTag(0x05))
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = build_file(&[]);
        bytes[0] ^= 0xFF;
        assert_eq!(DecodedTestFile::decode(&bytes), Err(TestFileReadError::BadMagic));
    }
}
