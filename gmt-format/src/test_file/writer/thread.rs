//! A background-thread, non-blocking wrapper around [`StreamWriter`].
//!
//! Grounded in `NonBlockingReplayFileRecorder`: the host's Update call must
//! never stall on file I/O, so writes are handed off to a dedicated thread
//! over an `mpsc` channel and the calling thread only blocks on `close`.

use crate::record::Record;
use crate::test_file::writer::{StreamWriter, TestFileSink, TestFileWriteError};
use alloc::string::ToString;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};

type WriterMutex<Sink> = Mutex<StreamWriter<Sink>>;

/// A [`StreamWriter`] driven from a background thread.
///
/// Requires the `std` feature.
pub struct NonBlockingStreamWriter<Sink: TestFileSink + Send + 'static> {
    writer: Option<Arc<WriterMutex<Sink>>>,
    sender: Sender<ThreadedWriterCommand>,
    receiver: Receiver<ThreadedWriterResponse>,
}

impl<Sink: TestFileSink + Send + 'static> NonBlockingStreamWriter<Sink> {
    /// Spawn the background thread and take ownership of `writer`.
    pub fn new(writer: StreamWriter<Sink>) -> NonBlockingStreamWriter<Sink> {
        let writer = Arc::new(Mutex::new(writer));

        let (sender_main, receiver_helper) = channel();
        let (sender_helper, receiver_main) = channel();

        let helper = ThreadedWriterThread {
            writer: Arc::downgrade(&writer),
            sender: sender_helper,
            receiver: receiver_helper,
        };

        std::thread::Builder::new()
            .name("gmt-test-file-writer".to_string())
            .spawn(move || helper.run())
            .expect("failed to start the test file writer thread");

        NonBlockingStreamWriter {
            writer: Some(writer),
            sender: sender_main,
            receiver: receiver_main,
        }
    }

    /// Whether `close` has already been called.
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Enqueue a record to be appended on the background thread.
    pub fn write_record(&mut self, record: Record) {
        let _ = self.sender.send(ThreadedWriterCommand::Write(record));
    }

    /// Stop the background thread, wait for it to drain, and finalize the
    /// underlying writer.
    ///
    /// # Panics
    ///
    /// Panics if already closed.
    pub fn close(&mut self) -> Result<Sink, (Sink, TestFileWriteError)> {
        let _ = self.sender.send(ThreadedWriterCommand::Close);
        self.sender = channel().0;

        let mut held = self.writer.take().expect("writer already closed");
        let writer = loop {
            match Arc::try_unwrap(held) {
                Ok(mutex) => break mutex,
                Err(still_shared) => held = still_shared,
            }
        };
        let writer = writer.into_inner().expect("writer mutex poisoned");
        writer.close()
    }

    /// Drain the next reported write error, if any.
    pub fn poll_errors(&mut self) -> Option<TestFileWriteError> {
        self.receiver.recv().ok().map(|response| match response {
            ThreadedWriterResponse::Error(error) => error,
            ThreadedWriterResponse::Closed => TestFileWriteError::Poisoned,
        })
    }
}

enum ThreadedWriterCommand {
    Write(Record),
    Close,
}

enum ThreadedWriterResponse {
    Error(TestFileWriteError),
    Closed,
}

struct ThreadedWriterThread<Sink: TestFileSink> {
    writer: Weak<WriterMutex<Sink>>,
    sender: Sender<ThreadedWriterResponse>,
    receiver: Receiver<ThreadedWriterCommand>,
}

impl<Sink: TestFileSink> ThreadedWriterThread<Sink> {
    fn run(self) {
        loop {
            let Ok(command) = self.receiver.recv() else {
                break;
            };
            if matches!(command, ThreadedWriterCommand::Close) {
                break;
            }
            let Some(writer) = self.writer.upgrade() else {
                break;
            };
            let Ok(mut writer) = writer.lock() else {
                break;
            };
            let ThreadedWriterCommand::Write(record) = command else {
                unreachable!()
            };
            if let Err(e) = writer.write_record(&record) {
                let _ = self.sender.send(ThreadedWriterResponse::Error(e));
            }
        }
        let _ = self.sender.send(ThreadedWriterResponse::Closed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputSnapshot;

    #[test]
    fn drains_queued_records_on_close() {
        let writer = StreamWriter::new(Vec::new()).unwrap();
        let mut non_blocking = NonBlockingStreamWriter::new(writer);
        for i in 0..4 {
            non_blocking.write_record(Record::Frame {
                timestamp_seconds: i as f64,
                input: InputSnapshot::default(),
            });
        }
        let bytes = non_blocking.close().unwrap();
        let decoded = crate::test_file::decoder::DecodedTestFile::decode(&bytes).unwrap();
        assert_eq!(decoded.frames.len(), 4);
    }
}
