//! The streaming writer: header, then tagged records, then `END`.

#[cfg(feature = "std")]
pub mod thread;

use crate::record::{Record, MAX_DATA_PAYLOAD};
use crate::test_file::header::FileHeader;
use crate::wire::{flatten_instructions, RecordIo};
use alloc::borrow::Cow;
use alloc::vec::Vec;

/// Something a [`StreamWriter`] can append bytes to and, on `Reset`,
/// truncate.
///
/// Grounded in `ReplayFileSink`: a small trait so the writer can target a
/// `Vec<u8>` in tests, a real file in production, or nothing at all.
pub trait TestFileSink {
    /// Append `bytes` to the sink.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Cow<'static, str>>;

    /// Discard everything written so far.
    fn truncate(&mut self) -> Result<(), Cow<'static, str>>;
}

impl TestFileSink for Vec<u8> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Cow<'static, str>> {
        self.try_reserve(bytes.len())
            .map_err(|_| Cow::Borrowed("allocation failed"))?;
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), Cow<'static, str>> {
        self.clear();
        Ok(())
    }
}

/// A sink that discards everything written to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTestFileSink;

impl TestFileSink for NullTestFileSink {
    fn write_bytes(&mut self, _bytes: &[u8]) -> Result<(), Cow<'static, str>> {
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), Cow<'static, str>> {
        Ok(())
    }
}

#[cfg(feature = "std")]
impl TestFileSink for std::fs::File {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Cow<'static, str>> {
        use std::io::Write;
        self.write_all(bytes)
            .map_err(|e| Cow::Owned(alloc::format!("write failed: {e}")))
    }

    fn truncate(&mut self) -> Result<(), Cow<'static, str>> {
        use std::io::{Seek, SeekFrom};
        self.set_len(0)
            .map_err(|e| Cow::Owned(alloc::format!("truncate failed: {e}")))?;
        self.seek(SeekFrom::Start(0))
            .map_err(|e| Cow::Owned(alloc::format!("seek failed: {e}")))?;
        Ok(())
    }
}

/// Errors a [`StreamWriter`] can report.
#[derive(Debug, Clone, PartialEq)]
pub enum TestFileWriteError {
    /// A PIN/TRACK payload exceeded [`MAX_DATA_PAYLOAD`].
    PayloadTooLarge,
    /// Opening the sink failed.
    IoOpen(Cow<'static, str>),
    /// A write to the sink failed.
    IoWrite(Cow<'static, str>),
    /// A call was made while the writer was already poisoned by a prior
    /// panic inside [`StreamWriter::do_with_poison`].
    Poisoned,
}

impl core::fmt::Display for TestFileWriteError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TestFileWriteError::PayloadTooLarge => write!(f, "payload exceeds MAX_DATA_PAYLOAD"),
            TestFileWriteError::IoOpen(e) => write!(f, "open failed: {e}"),
            TestFileWriteError::IoWrite(e) => write!(f, "write failed: {e}"),
            TestFileWriteError::Poisoned => write!(f, "writer is poisoned"),
        }
    }
}

/// Appends tagged records to a [`TestFileSink`], in order, with the header
/// written up front.
///
/// Grounded in `ReplayFileRecorder`: `do_with_poison` guards every mutating
/// call so a panic mid-write can't leave the writer silently half-updated;
/// once poisoned, every further call fails fast instead of writing a
/// corrupt stream.
pub struct StreamWriter<Sink: TestFileSink> {
    sink: Sink,
    poisoned: bool,
    closed: bool,
}

impl<Sink: TestFileSink> StreamWriter<Sink> {
    /// Open a new writer, writing the file header immediately.
    pub fn new(mut sink: Sink) -> Result<StreamWriter<Sink>, (Sink, TestFileWriteError)> {
        let header = FileHeader::default();
        if let Err(e) = sink.write_bytes(&header.to_bytes()) {
            return Err((sink, TestFileWriteError::IoOpen(e)));
        }
        Ok(StreamWriter {
            sink,
            poisoned: false,
            closed: false,
        })
    }

    /// Whether the writer is poisoned (a prior call panicked partway
    /// through).
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Append a single record.
    ///
    /// PIN/TRACK records whose payload exceeds [`MAX_DATA_PAYLOAD`] are
    /// rejected and logged rather than written; per SPEC_FULL.md §4.1, this
    /// is the one failure category that is the caller's fault rather than
    /// the sink's, so it is checked before entering the poison guard.
    pub fn write_record(&mut self, record: &Record) -> Result<(), TestFileWriteError> {
        if let Record::Pin { payload, .. } | Record::Track { payload, .. } = record {
            if payload.len() > MAX_DATA_PAYLOAD {
                log::error!("dropping record: payload exceeds MAX_DATA_PAYLOAD");
                return Err(TestFileWriteError::PayloadTooLarge);
            }
        }
        self.do_with_poison(|sink| {
            let instructions = record.write_instructions();
            let bytes = flatten_instructions(&instructions);
            sink.write_bytes(&bytes)
                .map_err(TestFileWriteError::IoWrite)
        })
    }

    /// Write the terminating `END` record and return the sink.
    pub fn close(mut self) -> Result<Sink, (Sink, TestFileWriteError)> {
        if !self.closed {
            if let Err(e) = self.write_record(&Record::End) {
                return Err((self.sink, e));
            }
            self.closed = true;
        }
        Ok(self.sink)
    }

    /// Truncate the sink and rewrite the header, as if freshly opened.
    ///
    /// Used by `Reset` in RECORD mode (SPEC_FULL.md §4.7).
    pub fn reset(&mut self) -> Result<(), TestFileWriteError> {
        self.do_with_poison(|sink| {
            sink.truncate().map_err(TestFileWriteError::IoWrite)?;
            sink.write_bytes(&FileHeader::default().to_bytes())
                .map_err(TestFileWriteError::IoWrite)
        })?;
        self.closed = false;
        Ok(())
    }

    fn do_with_poison<F>(&mut self, f: F) -> Result<(), TestFileWriteError>
    where
        F: FnOnce(&mut Sink) -> Result<(), TestFileWriteError>,
    {
        if self.poisoned {
            return Err(TestFileWriteError::Poisoned);
        }
        self.poisoned = true;
        let result = f(&mut self.sink);
        if result.is_ok() {
            self.poisoned = false;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputSnapshot;
    use crate::test_file::header::{FileHeader, MAGIC};

    #[test]
    fn writes_header_then_records_then_end() {
        let writer = StreamWriter::new(Vec::new()).expect("open");
        let mut writer = writer;
        writer
            .write_record(&Record::Frame {
                timestamp_seconds: 0.0,
                input: InputSnapshot::default(),
            })
            .unwrap();
        let bytes = writer.close().unwrap();

        assert_eq!(FileHeader::parse(&bytes).unwrap(), FileHeader::default());
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), MAGIC);
        assert_eq!(*bytes.last().unwrap(), crate::record::RecordTag::End as u8);
    }

    #[test]
    fn rejects_oversized_payload_without_poisoning() {
        let mut writer = StreamWriter::new(Vec::new()).expect("open");
        let mut payload = crate::wire::ByteVec::new();
        payload.extend_from_slice(&[0u8; MAX_DATA_PAYLOAD + 1]);
        let result = writer.write_record(&Record::Pin {
            key: 1,
            sequential_index: 0,
            payload,
        });
        assert_eq!(result, Err(TestFileWriteError::PayloadTooLarge));
        assert!(!writer.is_poisoned());
    }

    #[test]
    fn reset_truncates_and_rewrites_header() {
        let mut writer = StreamWriter::new(Vec::new()).expect("open");
        writer
            .write_record(&Record::Frame {
                timestamp_seconds: 1.0,
                input: InputSnapshot::default(),
            })
            .unwrap();
        writer.reset().unwrap();
        let bytes = writer.close().unwrap();
        assert_eq!(bytes.len(), 4 + 1); // header + END tag only
    }
}
