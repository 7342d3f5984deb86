//! Output files of a successful compile.
//!
//! [`database`] lays out and streams the binary help database;
//! [`header`] regenerates the `#define` header only when its content
//! changes. Both share the 12-byte [`SignatureRecord`], which also marks
//! help appended to an executable.

pub mod database;
pub mod header;

pub use database::{DatabaseHeader, calc_offsets, write_database, write_help_file};
pub use header::{HeaderStatus, render_header, write_header};

use std::path::Path;

/// Directory where a replacement for `path` is staged before it is
/// renamed into place.
pub(crate) fn staging_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Magic number opening every help database.
pub const HELP_SIGNATURE: u32 = 0xAFBC_1823;

/// `{signature, version, base}`, little-endian.
///
/// In a `.hlp` file `base` is 0. At the end of an executable it is the
/// offset where the appended help starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRecord {
    pub version: i32,
    pub base: u32,
}

impl SignatureRecord {
    pub const SIZE: usize = 12;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&HELP_SIGNATURE.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.base.to_le_bytes());
        out
    }

    /// Reads a record, or `None` if `bytes` is short or lacks the magic.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let field = |at: usize| -> Option<[u8; 4]> { bytes.get(at..at + 4)?.try_into().ok() };
        if u32::from_le_bytes(field(0)?) != HELP_SIGNATURE {
            return None;
        }
        Some(Self {
            version: i32::from_le_bytes(field(4)?),
            base: u32::from_le_bytes(field(8)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_record() {
        let record = SignatureRecord {
            version: 100,
            base: 0x1234,
        };
        let bytes = record.encode();
        assert_eq!(&bytes[..4], &[0x23, 0x18, 0xBC, 0xAF]);
        assert_eq!(SignatureRecord::decode(&bytes), Some(record));
        assert_eq!(SignatureRecord::decode(&bytes[..11]), None);
        assert_eq!(SignatureRecord::decode(&[0u8; 12]), None);
    }
}
