//! Checksum stamp persisted next to each archive

use crate::cache::archive::Compression;
use crate::error::{DircacheError, DircacheResult};
use serde::{Deserialize, Serialize};

/// Current stamp layout
pub const STAMP_VERSION: u32 = 1;

/// Metadata written after the archive of an entry
///
/// The stamp is the commit marker of an entry: an archive without a
/// stamp is treated as absent. It only holds values derived from the
/// stored content, so storing the same trees twice yields the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStamp {
    /// Stamp layout version
    pub version: u32,
    /// Checksum supplied at store time, if any
    pub checksum: Option<String>,
    /// Compression used for the archive
    pub compression: Compression,
    /// Logical names of the archived directories
    pub directories: Vec<String>,
    /// Size of the archive object in bytes
    pub size_bytes: u64,
}

impl EntryStamp {
    /// Create a stamp for a freshly built archive
    pub fn new(
        checksum: Option<String>,
        compression: Compression,
        directories: Vec<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            version: STAMP_VERSION,
            checksum,
            compression,
            directories,
            size_bytes,
        }
    }

    /// Serialize for upload
    pub fn to_bytes(&self) -> DircacheResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse a downloaded stamp
    pub fn from_bytes(key: &str, bytes: &[u8]) -> DircacheResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| DircacheError::transport(key, format!("unreadable entry stamp: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_serializes_checksum() {
        let stamp = EntryStamp::new(
            Some("v1".to_string()),
            Compression::Gzip,
            vec!["out".to_string()],
            42,
        );
        let bytes = stamp.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"checksum\": \"v1\""));
        assert!(text.contains("\"compression\": \"gzip\""));

        let parsed = EntryStamp::from_bytes("k", &bytes).unwrap();
        assert_eq!(parsed, stamp);
    }

    #[test]
    fn stamp_without_checksum() {
        let stamp = EntryStamp::new(None, Compression::None, vec![], 0);
        let parsed = EntryStamp::from_bytes("k", &stamp.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed.checksum, None);
    }

    #[test]
    fn garbage_stamp_is_transport_error() {
        let err = EntryStamp::from_bytes("a/b/entry.json", b"not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
        assert!(err.to_string().contains("a/b/entry.json"));
    }
}
