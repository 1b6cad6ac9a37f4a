//! The fixed 4-byte file header.

use alloc::borrow::Cow;

/// `"GM"`, little-endian as a `u16`: `0x4D47`.
pub const MAGIC: u16 = 0x4D47;

/// The version this crate writes and expects to read.
///
/// Earlier drafts of this format used a frame-index-keyed record layout
/// with no PIN/TRACK support (version 0/1); this crate only ever produces
/// and accepts the timestamp-keyed layout described in this module,
/// version 2.
pub const CURRENT_VERSION: u16 = 2;

const HEADER_BYTES: usize = 4;

/// The parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version. Must equal [`CURRENT_VERSION`] for this crate's
    /// decoder to accept the file.
    pub version: u16,
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            version: CURRENT_VERSION,
        }
    }
}

impl FileHeader {
    /// Encode the header to its 4-byte wire form.
    pub fn to_bytes(self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0..2].copy_from_slice(&MAGIC.to_le_bytes());
        out[2..4].copy_from_slice(&self.version.to_le_bytes());
        out
    }

    /// Parse and validate a header from the front of a file's bytes.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error if fewer than 4 bytes are present, the
    /// magic doesn't match, or the version isn't [`CURRENT_VERSION`].
    pub fn parse(bytes: &[u8]) -> Result<FileHeader, Cow<'static, str>> {
        if bytes.len() < HEADER_BYTES {
            return Err(Cow::Borrowed("file is shorter than the header"));
        }
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != MAGIC {
            return Err(Cow::Owned(alloc::format!(
                "bad magic: expected 0x{MAGIC:04X}, got 0x{magic:04X}"
            )));
        }
        let version = u16::from_le_bytes([bytes[2], bytes[3]]);
        if version != CURRENT_VERSION {
            return Err(Cow::Owned(alloc::format!(
                "unsupported version: expected {CURRENT_VERSION}, got {version}"
            )));
        }
        Ok(FileHeader { version })
    }
}
